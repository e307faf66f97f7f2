//! Render composition and pipeline batching.
//!
//! Flows describe what they want drawn by returning a [`Render`]. The frame loop walks all
//! renders, sorts the instanced draws into one batch per pipeline (regular, highlighted and
//! measurement) and draws each batch with its pipeline bound once.
//!
//! The same render tree drives picking: [`Render::pickables`] collects every draw that
//! carries a [`PickMesh`] and [`Render::map_ids`] records which flow owns which object id.

use std::collections::{HashMap, HashSet};

use crate::{data_structures::model::Model, pick::{PickMesh, Pickable}};

/// One instanced draw: a model, its instance buffer and the object id.
///
/// `pick` is `None` for geometry that should never be hit by the pointer, like measurement
/// segments.
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub model: &'a Model,
    pub amount: usize,
    pub id: u32,
    pub name: &'a str,
    pub pick: Option<&'a PickMesh>,
}

/// Specifies how a flow's objects should be rendered.
///
/// - `None` renders nothing
/// - `Default(Instanced)` renders one object with its materials
/// - `Defaults(Vec<Instanced>)` renders a batch of objects with their materials
/// - `Highlighted(Instanced)` renders one object tinted as hovered
/// - `Measure(Instanced)` renders measurement geometry in a solid colour
/// - `Composed(Vec<Render>)` recursively renders a composition of renders
pub enum Render<'a> {
    None,
    Default(Instanced<'a>),
    Defaults(Vec<Instanced<'a>>),
    Highlighted(Instanced<'a>),
    Measure(Instanced<'a>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    /// Map object ids to the flows that render them.
    pub(crate) fn map_ids(&self, flow_id: usize, map: &mut HashMap<u32, HashSet<usize>>) {
        let mut insert = |id: u32| {
            map.entry(id)
                .and_modify(|flows| _ = flows.insert(flow_id))
                .or_insert([flow_id].into());
        };
        match self {
            Render::Default(instanced) | Render::Highlighted(instanced) => insert(instanced.id),
            Render::Defaults(vec) => vec.iter().for_each(|instanced| insert(instanced.id)),
            Render::Composed(renders) => renders
                .iter()
                .for_each(|render| render.map_ids(flow_id, map)),
            // Measurement geometry is never picked
            Render::Measure(_) | Render::None => (),
        }
    }

    /// Everything in this render that the pointer ray can hit, tagged with `flow_id`.
    pub(crate) fn pickables<'r>(&'r self, flow_id: usize, out: &mut Vec<Pickable<'r>>) {
        match self {
            Render::Default(instanced) | Render::Highlighted(instanced) => {
                out.extend(Pickable::from_instanced(instanced, flow_id));
            }
            Render::Defaults(vec) => {
                out.extend(
                    vec.iter()
                        .filter_map(|instanced| Pickable::from_instanced(instanced, flow_id)),
                );
            }
            Render::Composed(renders) => renders
                .iter()
                .for_each(|render| render.pickables(flow_id, out)),
            Render::Measure(_) | Render::None => (),
        }
    }

    pub(crate) fn set_pipelines(
        self,
        basics: &mut Vec<Instanced<'a>>,
        highlights: &mut Vec<Instanced<'a>>,
        measures: &mut Vec<Instanced<'a>>,
    ) {
        match self {
            Render::Default(instanced) => basics.push(instanced),
            Render::Defaults(mut vec) => basics.append(&mut vec),
            Render::Highlighted(instanced) => highlights.push(instanced),
            Render::Measure(instanced) => measures.push(instanced),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(basics, highlights, measures)),
            Render::None => (),
        }
    }
}
