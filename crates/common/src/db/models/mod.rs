//! SeaORM entity models
//!
//! Database entities for the CiteForge catalog and citation graph

mod citation;
mod graph_node;
mod publication;

pub use publication::{
    Entity as PublicationEntity,
    Model as Publication,
    ActiveModel as PublicationActiveModel,
    Column as PublicationColumn,
};

pub use graph_node::{
    Entity as GraphNodeEntity,
    Model as GraphNode,
    ActiveModel as GraphNodeActiveModel,
    Column as GraphNodeColumn,
};

pub use citation::{
    Entity as CitationEntity,
    Model as Citation,
    ActiveModel as CitationActiveModel,
    Column as CitationColumn,
};
