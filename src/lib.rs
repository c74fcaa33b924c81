//! Typed attribute validation and declarative block synthesis.
//!
//! A resource kind pairs a [`ResourceSchema`] (what a declaration may contain)
//! with an [`EmissionPlan`] (how validated attributes become a nested
//! [`ConfigBlock`]). Kinds are grouped into namespaced [`ResourceModule`]s and
//! a [`Session`] runs declarations through validate → synthesize → emit,
//! accumulating the blocks into a [`Manifest`].
pub mod attrs;
pub mod block;
pub mod catalog;
pub mod declaration;
pub mod descriptor;
pub mod error;
pub mod manifest;
pub mod path_de;
pub mod reference;
pub mod registry;
pub mod schema;
pub mod session;

pub use attrs::{FieldSource, Record, ValidatedAttributes};
pub use block::{BlockValue, ConfigBlock, EmissionPlan, EmitStep, Omit};
pub use declaration::Declaration;
pub use descriptor::{Constraint, TypeDescriptor};
pub use error::{SynthError, SynthResult};
pub use manifest::Manifest;
pub use reference::{ComputedProperty, ResourceReference};
pub use registry::{Registry, ResourceKind, ResourceModule};
pub use schema::{validators, AttributeSpec, ResourceSchema};
pub use session::{Session, SessionConfig};
