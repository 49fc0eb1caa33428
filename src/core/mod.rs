//! Core types shared by every layer: spans, graph ids, the property value
//! algebra, and the error taxonomy.

pub mod error;
pub mod gid;
pub mod span;
pub mod value;
pub mod vertex_edge_path;

pub use error::{ExecError, GraphError, GraphResult, ParseError, PlanError};
pub use gid::{GraphId, LabelId};
pub use span::{Position, Span};
pub use value::Value;
pub use vertex_edge_path::{Edge, EdgeSet, Path, PathEntry, Vertex};
