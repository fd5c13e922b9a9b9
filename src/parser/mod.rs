//! Parser for specification documents
//!
//! Turns TOML text into the raw declaration tree of [`crate::ast`]. The
//! parser only checks shape: a recognized key must hold the kind of value it
//! is documented to hold. Everything semantic is left to the normalizer.

use crate::ast::*;
use crate::common::{DocPath, LineCol, Span};
use crate::diagnostics::{ParseError, SourceFile};
use toml::{Table, Value};

/// Specification format version understood by this parser
pub const SUPPORTED_VERSION: i64 = 1;

/// Parse a specification document into a raw tree
pub fn parse(source: &SourceFile) -> Result<Document, ParseError> {
    let table: Table = toml::from_str(&source.content).map_err(|e| syntax_error(source, &e))?;
    Parser::new().parse_document(table)
}

fn syntax_error(source: &SourceFile, err: &toml::de::Error) -> ParseError {
    let span = err.span().map(Span::from).unwrap_or_default();
    ParseError::Syntax {
        message: err.message().trim().to_string(),
        location: LineCol::from_offset(&source.content, span.start),
        span: span.into(),
        src: source.to_named_source(),
    }
}

/// Parser state
struct Parser;

impl Parser {
    fn new() -> Self {
        Self
    }

    // ==================== DOCUMENT ====================

    fn parse_document(&mut self, table: Table) -> Result<Document, ParseError> {
        let root = DocPath::root();
        let mut version = None;
        let mut services = Vec::new();

        for (key, value) in table {
            match key.as_str() {
                "version" => version = Some(expect_int(value, &root.key("version"))?),
                "service" => {
                    for (i, table) in expect_tables(value, &root.key("service"))?
                        .into_iter()
                        .enumerate()
                    {
                        services.push(self.parse_service(table, root.index("service", i))?);
                    }
                }
                _ => return Err(ParseError::UnknownKey { key }),
            }
        }

        let version = version.ok_or(ParseError::MissingVersion)?;
        if version != SUPPORTED_VERSION {
            return Err(ParseError::UnsupportedVersion { found: version });
        }

        Ok(Document { version, services })
    }

    fn parse_service(&mut self, table: Table, path: DocPath) -> Result<ServiceDecl, ParseError> {
        let mut service = ServiceDecl {
            path,
            name: None,
            persistence: None,
            presentation: None,
            aggregates: Vec::new(),
            extra: Extra::new(),
        };

        for (key, value) in table {
            let at = service.path.key(&key);
            match key.as_str() {
                "name" => service.name = Some(expect_string(value, &at)?),
                "persistence" => service.persistence = Some(expect_string(value, &at)?),
                "presentation" => service.presentation = Some(expect_string(value, &at)?),
                "aggregate" => {
                    for (i, table) in expect_tables(value, &at)?.into_iter().enumerate() {
                        let path = service.path.index("aggregate", i);
                        service.aggregates.push(self.parse_aggregate(table, path)?);
                    }
                }
                _ => {
                    service.extra.insert(key, value);
                }
            }
        }

        Ok(service)
    }

    // ==================== AGGREGATES ====================

    fn parse_aggregate(
        &mut self,
        table: Table,
        path: DocPath,
    ) -> Result<AggregateDecl, ParseError> {
        let mut aggregate = AggregateDecl {
            path,
            name: None,
            root: None,
            entities: Vec::new(),
            relations: Vec::new(),
            extra: Extra::new(),
        };

        for (key, value) in table {
            let at = aggregate.path.key(&key);
            match key.as_str() {
                "name" => aggregate.name = Some(expect_string(value, &at)?),
                "root" => {
                    let table = expect_table(value, &at)?;
                    aggregate.root = Some(self.parse_entity(table, at)?);
                }
                "entity" => {
                    for (i, table) in expect_tables(value, &at)?.into_iter().enumerate() {
                        let path = aggregate.path.index("entity", i);
                        aggregate.entities.push(self.parse_entity(table, path)?);
                    }
                }
                "relation" => {
                    for (i, table) in expect_tables(value, &at)?.into_iter().enumerate() {
                        let path = aggregate.path.index("relation", i);
                        aggregate.relations.push(self.parse_relation(table, path)?);
                    }
                }
                _ => {
                    aggregate.extra.insert(key, value);
                }
            }
        }

        Ok(aggregate)
    }

    fn parse_entity(&mut self, table: Table, path: DocPath) -> Result<EntityDecl, ParseError> {
        let mut entity = EntityDecl {
            path,
            name: None,
            table: None,
            fields: Vec::new(),
            extra: Extra::new(),
        };

        for (key, value) in table {
            let at = entity.path.key(&key);
            match key.as_str() {
                "name" => entity.name = Some(expect_string(value, &at)?),
                "table" => entity.table = Some(expect_string(value, &at)?),
                "fields" => {
                    for (i, table) in expect_tables(value, &at)?.into_iter().enumerate() {
                        let path = entity.path.index("fields", i);
                        entity.fields.push(self.parse_field(table, path)?);
                    }
                }
                _ => {
                    entity.extra.insert(key, value);
                }
            }
        }

        Ok(entity)
    }

    fn parse_field(&mut self, table: Table, path: DocPath) -> Result<FieldDecl, ParseError> {
        let mut field = FieldDecl {
            path,
            name: None,
            ty: None,
            nullable: false,
            role: None,
            variants: None,
            max_length: None,
            min: None,
            max: None,
            extra: Extra::new(),
        };

        for (key, value) in table {
            let at = field.path.key(&key);
            match key.as_str() {
                "name" => field.name = Some(expect_string(value, &at)?),
                "type" => field.ty = Some(expect_string(value, &at)?),
                "nullable" => field.nullable = expect_bool(value, &at)?,
                "role" => field.role = Some(expect_string(value, &at)?),
                "variants" => field.variants = Some(expect_strings(value, &at)?),
                "max_length" => field.max_length = Some(expect_int(value, &at)?),
                "min" => field.min = Some(expect_int(value, &at)?),
                "max" => field.max = Some(expect_int(value, &at)?),
                _ => {
                    field.extra.insert(key, value);
                }
            }
        }

        Ok(field)
    }

    fn parse_relation(&mut self, table: Table, path: DocPath) -> Result<RelationDecl, ParseError> {
        let mut relation = RelationDecl {
            path,
            name: None,
            from: None,
            to: None,
            owned: None,
            cardinality: None,
            key: None,
            extra: Extra::new(),
        };

        for (key, value) in table {
            let at = relation.path.key(&key);
            match key.as_str() {
                "name" => relation.name = Some(expect_string(value, &at)?),
                "from" => relation.from = Some(expect_string(value, &at)?),
                "to" => relation.to = Some(expect_string(value, &at)?),
                "owned" => relation.owned = Some(expect_bool(value, &at)?),
                "cardinality" => relation.cardinality = Some(expect_string(value, &at)?),
                "key" => relation.key = Some(expect_string(value, &at)?),
                _ => {
                    relation.extra.insert(key, value);
                }
            }
        }

        Ok(relation)
    }
}

// ==================== SHAPE HELPERS ====================

fn malformed(path: &DocPath, expected: &'static str) -> ParseError {
    ParseError::Malformed {
        path: path.clone(),
        expected,
    }
}

fn expect_string(value: Value, path: &DocPath) -> Result<String, ParseError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(malformed(path, "a string")),
    }
}

fn expect_bool(value: Value, path: &DocPath) -> Result<bool, ParseError> {
    match value {
        Value::Boolean(b) => Ok(b),
        _ => Err(malformed(path, "a boolean")),
    }
}

fn expect_int(value: Value, path: &DocPath) -> Result<i64, ParseError> {
    match value {
        Value::Integer(i) => Ok(i),
        _ => Err(malformed(path, "an integer")),
    }
}

fn expect_strings(value: Value, path: &DocPath) -> Result<Vec<String>, ParseError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(malformed(path, "an array of strings")),
            })
            .collect(),
        _ => Err(malformed(path, "an array of strings")),
    }
}

fn expect_table(value: Value, path: &DocPath) -> Result<Table, ParseError> {
    match value {
        Value::Table(t) => Ok(t),
        _ => Err(malformed(path, "a table")),
    }
}

/// Arrays of tables, written either as `[[key]]` blocks or inline
fn expect_tables(value: Value, path: &DocPath) -> Result<Vec<Table>, ParseError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Table(t) => Ok(t),
                _ => Err(malformed(path, "an array of tables")),
            })
            .collect(),
        _ => Err(malformed(path, "an array of tables")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(src: &str) -> Result<Document, ParseError> {
        parse(&SourceFile::new("test.toml", src))
    }

    #[test]
    fn test_empty_document_needs_version() {
        assert!(matches!(parse_str(""), Err(ParseError::MissingVersion)));
        assert_eq!(parse_str("version = 1").unwrap().services.len(), 0);
    }

    #[test]
    fn test_extra_keys_keep_order() {
        let doc = parse_str(
            r#"
            version = 1
            [[service]]
            name = "s"
            zeta = 1
            alpha = 2
            "#,
        )
        .unwrap();
        let keys: Vec<_> = doc.services[0].extra.keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }
}
