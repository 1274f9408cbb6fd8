// SPDX-License-Identifier: Apache-2.0

//! External native type grammar.
//!
//! Parses the type strings an external catalog declares (`int`,
//! `decimal(12,2)`, `array<struct<a:int,b:string>>`, ...) into [`NativeType`].

use std::fmt;

/// Precision used by the catalog when `decimal` is declared without arguments.
pub const DEFAULT_DECIMAL_PRECISION: u32 = 10;
/// Scale used by the catalog when `decimal` is declared without a scale.
pub const DEFAULT_DECIMAL_SCALE: u32 = 0;
/// Deepest container nesting accepted before parsing gives up.
pub const MAX_TYPE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    String,
    Varchar(u32),
    Char(u32),
    Binary,
    Date,
    Timestamp,
    Array(Box<NativeType>),
    Map(Box<NativeType>, Box<NativeType>),
    Struct(Vec<(String, NativeType)>),
    Union(Vec<NativeType>),
}

impl NativeType {
    /// Container types are only ever exposed as their serialized text form.
    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            NativeType::Array(_) | NativeType::Map(..) | NativeType::Struct(_) | NativeType::Union(_)
        )
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Boolean => f.write_str("boolean"),
            NativeType::TinyInt => f.write_str("tinyint"),
            NativeType::SmallInt => f.write_str("smallint"),
            NativeType::Int => f.write_str("int"),
            NativeType::BigInt => f.write_str("bigint"),
            NativeType::Float => f.write_str("float"),
            NativeType::Double => f.write_str("double"),
            NativeType::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            NativeType::String => f.write_str("string"),
            NativeType::Varchar(n) => write!(f, "varchar({n})"),
            NativeType::Char(n) => write!(f, "char({n})"),
            NativeType::Binary => f.write_str("binary"),
            NativeType::Date => f.write_str("date"),
            NativeType::Timestamp => f.write_str("timestamp"),
            NativeType::Array(inner) => write!(f, "array<{inner}>"),
            NativeType::Map(k, v) => write!(f, "map<{k},{v}>"),
            NativeType::Struct(fields) => {
                f.write_str("struct<")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{name}:{ty}")?;
                }
                f.write_str(">")
            }
            NativeType::Union(members) => {
                f.write_str("uniontype<")?;
                for (i, ty) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{ty}")?;
                }
                f.write_str(">")
            }
        }
    }
}

/// Parses a native type string. The error is a human-readable reason.
pub fn parse_native_type(input: &str) -> Result<NativeType, String> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        depth: 0,
    };
    let ty = parser.parse_type()?;
    parser.skip_ws();
    if parser.pos != input.len() {
        return Err(format!("unexpected trailing input at offset {}", parser.pos));
    }
    Ok(ty)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest().chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(format!("expected '{expected}' at offset {}", self.pos))
        }
    }

    fn ident(&mut self) -> Result<&'a str, String> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(format!("expected a type name at offset {}", self.pos));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn number(&mut self) -> Result<u32, String> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if len == 0 {
            return Err(format!("expected a number at offset {}", self.pos));
        }
        let value = rest[..len]
            .parse::<u32>()
            .map_err(|e| format!("invalid number '{}': {e}", &rest[..len]))?;
        self.pos += len;
        Ok(value)
    }

    /// `(n)` or `(p,s)`; returns what was present.
    fn params(&mut self) -> Result<Vec<u32>, String> {
        let mut values = Vec::new();
        if self.eat('(') {
            values.push(self.number()?);
            while self.eat(',') {
                values.push(self.number()?);
            }
            self.expect(')')?;
        }
        Ok(values)
    }

    fn parse_type(&mut self) -> Result<NativeType, String> {
        if self.depth >= MAX_TYPE_DEPTH {
            return Err(format!("type nesting exceeds {MAX_TYPE_DEPTH} levels"));
        }
        self.depth += 1;
        let ty = self.parse_type_inner();
        self.depth -= 1;
        ty
    }

    fn parse_type_inner(&mut self) -> Result<NativeType, String> {
        let name = self.ident()?.to_ascii_lowercase();
        let ty = match name.as_str() {
            "boolean" => NativeType::Boolean,
            "tinyint" => NativeType::TinyInt,
            "smallint" => NativeType::SmallInt,
            "int" | "integer" => NativeType::Int,
            "bigint" => NativeType::BigInt,
            "float" => NativeType::Float,
            "double" => {
                // "double precision" is accepted as a synonym.
                let save = self.pos;
                match self.ident() {
                    Ok(word) if word.eq_ignore_ascii_case("precision") => {}
                    _ => self.pos = save,
                }
                NativeType::Double
            }
            "decimal" | "numeric" => match self.params()?.as_slice() {
                [] => NativeType::Decimal {
                    precision: DEFAULT_DECIMAL_PRECISION,
                    scale: DEFAULT_DECIMAL_SCALE,
                },
                [p] => NativeType::Decimal {
                    precision: *p,
                    scale: DEFAULT_DECIMAL_SCALE,
                },
                [p, s] if s <= p => NativeType::Decimal {
                    precision: *p,
                    scale: *s,
                },
                [p, s] => return Err(format!("decimal scale {s} exceeds precision {p}")),
                _ => return Err("decimal takes at most two parameters".to_string()),
            },
            "string" => NativeType::String,
            "varchar" => NativeType::Varchar(self.single_length("varchar")?),
            "char" => NativeType::Char(self.single_length("char")?),
            "binary" => NativeType::Binary,
            "date" => NativeType::Date,
            "timestamp" => NativeType::Timestamp,
            "array" => {
                self.expect('<')?;
                let inner = self.parse_type()?;
                self.expect('>')?;
                NativeType::Array(Box::new(inner))
            }
            "map" => {
                self.expect('<')?;
                let key = self.parse_type()?;
                self.expect(',')?;
                let value = self.parse_type()?;
                self.expect('>')?;
                NativeType::Map(Box::new(key), Box::new(value))
            }
            "struct" => {
                self.expect('<')?;
                let mut fields = Vec::new();
                loop {
                    let field = self.ident()?.to_string();
                    self.expect(':')?;
                    fields.push((field, self.parse_type()?));
                    if !self.eat(',') {
                        break;
                    }
                }
                self.expect('>')?;
                NativeType::Struct(fields)
            }
            "uniontype" => {
                self.expect('<')?;
                let mut members = vec![self.parse_type()?];
                while self.eat(',') {
                    members.push(self.parse_type()?);
                }
                self.expect('>')?;
                NativeType::Union(members)
            }
            other => return Err(format!("unknown type '{other}'")),
        };
        Ok(ty)
    }

    fn single_length(&mut self, name: &str) -> Result<u32, String> {
        match self.params()?.as_slice() {
            [n] if *n > 0 => Ok(*n),
            [_] => Err(format!("{name} length must be positive")),
            [] => Err(format!("{name} requires a length")),
            _ => Err(format!("{name} takes exactly one parameter")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_primitive_types_case_insensitively() {
        assert_eq!(parse_native_type("INT").unwrap(), NativeType::Int);
        assert_eq!(parse_native_type(" bigint ").unwrap(), NativeType::BigInt);
        assert_eq!(parse_native_type("double precision").unwrap(), NativeType::Double);
        assert_eq!(parse_native_type("String").unwrap(), NativeType::String);
    }

    #[test]
    fn test_parses_parameterized_types() {
        assert_eq!(
            parse_native_type("decimal(12, 2)").unwrap(),
            NativeType::Decimal { precision: 12, scale: 2 }
        );
        assert_eq!(
            parse_native_type("decimal").unwrap(),
            NativeType::Decimal { precision: 10, scale: 0 }
        );
        assert_eq!(parse_native_type("varchar(40)").unwrap(), NativeType::Varchar(40));
        assert_eq!(parse_native_type("char(8)").unwrap(), NativeType::Char(8));
    }

    #[test]
    fn test_parses_nested_complex_types() {
        let ty = parse_native_type("map<string,array<struct<a:int,b:decimal(5,1)>>>").unwrap();
        assert!(ty.is_complex());
        assert_eq!(ty.to_string(), "map<string,array<struct<a:int,b:decimal(5,1)>>>");

        let union = parse_native_type("uniontype<int, string>").unwrap();
        assert_eq!(union, NativeType::Union(vec![NativeType::Int, NativeType::String]));
    }

    #[test]
    fn test_rejects_malformed_types() {
        assert!(parse_native_type("varchar").is_err());
        assert!(parse_native_type("decimal(2,5)").is_err());
        assert!(parse_native_type("array<int").is_err());
        assert!(parse_native_type("geometry").is_err());
        assert!(parse_native_type("int extra").is_err());
        assert!(parse_native_type("").is_err());
    }

    #[test]
    fn test_rejects_deeply_nested_types() {
        let levels = 20_000;
        let input = format!("{}int{}", "array<".repeat(levels), ">".repeat(levels));
        let err = parse_native_type(&input).unwrap_err();
        assert_eq!(err, "type nesting exceeds 64 levels");

        let struct_bomb = format!("{}int{}", "struct<a:".repeat(levels), ">".repeat(levels));
        assert!(parse_native_type(&struct_bomb).is_err());
    }

    #[test]
    fn test_accepts_nesting_up_to_the_limit() {
        let levels = MAX_TYPE_DEPTH - 1;
        let input = format!("{}int{}", "array<".repeat(levels), ">".repeat(levels));
        let ty = parse_native_type(&input).unwrap();
        assert_eq!(ty.to_string(), input);
    }
}
