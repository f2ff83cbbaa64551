//! Mapping vocabulary constants
//!
//! Term type and graph IRIs from the W3C R2RML Recommendation
//! (https://www.w3.org/TR/r2rml/) and the RML namespace that reuses them.
//! Upstream rule records may use either namespace.

/// R2RML vocabulary namespace and constants
pub struct R2RML;

impl R2RML {
    /// R2RML namespace IRI
    pub const NS: &'static str = "http://www.w3.org/ns/r2rml#";

    /// rr:IRI - Term type for IRIs
    pub const IRI: &'static str = "http://www.w3.org/ns/r2rml#IRI";

    /// rr:BlankNode - Term type for blank nodes
    pub const BLANK_NODE: &'static str = "http://www.w3.org/ns/r2rml#BlankNode";

    /// rr:Literal - Term type for literals
    pub const LITERAL: &'static str = "http://www.w3.org/ns/r2rml#Literal";

    /// rr:defaultGraph - Constant graph map value meaning "no named graph"
    pub const DEFAULT_GRAPH: &'static str = "http://www.w3.org/ns/r2rml#defaultGraph";
}

/// RML vocabulary namespace and constants
pub struct RML;

impl RML {
    /// RML namespace IRI
    pub const NS: &'static str = "http://w3id.org/rml/";

    /// rml:IRI
    pub const IRI: &'static str = "http://w3id.org/rml/IRI";

    /// rml:BlankNode
    pub const BLANK_NODE: &'static str = "http://w3id.org/rml/BlankNode";

    /// rml:Literal
    pub const LITERAL: &'static str = "http://w3id.org/rml/Literal";

    /// rml:defaultGraph
    pub const DEFAULT_GRAPH: &'static str = "http://w3id.org/rml/defaultGraph";
}

/// XSD datatype IRIs used by tests and callers building typed literals.
pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
}

/// Whether `iri` names the default graph in either namespace.
pub fn is_default_graph(iri: &str) -> bool {
    iri == R2RML::DEFAULT_GRAPH || iri == RML::DEFAULT_GRAPH
}
