// Parser module - compiles method source text into MethodDef ASTs
use crate::{ast::MethodDef, Result, VirtkwError};

pub mod method_parser;

#[cfg(test)]
mod tests;

pub use method_parser::MethodParser;

/// Trait for method parsers
pub trait Parser: Send + Sync {
    /// Parse the source of exactly one method
    fn parse_method(&self, source: &str) -> Result<MethodDef>;

    /// Parse a sequence of method definitions
    fn parse_methods(&self, source: &str) -> Result<Vec<MethodDef>>;

    /// Get parser name for debugging
    fn name(&self) -> &'static str;
}

/// Create a parser based on type
pub fn create_parser(parser_type: &str) -> Result<Box<dyn Parser>> {
    match parser_type {
        "moo" | "method" => Ok(Box::new(MethodParser::new())),
        _ => Err(VirtkwError::Parse(format!(
            "Unknown parser type: {parser_type}"
        ))),
    }
}
