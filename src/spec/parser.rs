// src/spec/parser.rs

//! Spec string grammar parser
//!
//! Grammar (whitespace-insensitive):
//!
//! ```text
//! name[@version][+variant|~variant|name=value ...]
//!     [%compiler[@version]][arch=platform-os-target][^dep-spec ...]
//! ```
//!
//! A version clause is a single version (`@1.2`), an inclusive range
//! (`@1.0:1.5`, either end open) or a set (`@1.0,2.0:2.5`). Dependency
//! edges may carry a deptype annotation: `^[deptypes=build,link]dep`.
//! Successive `^dep` clauses attach to the most recent root spec; a bare
//! name token begins a new root in the forest.

use super::{Arch, DepEdge, DepType, DepTypes, CompilerSpec, Spec, VariantValue};
use crate::error::{Error, Result};
use crate::version::VersionConstraint;

/// Parse a whitespace-separated forest of specs
pub fn parse_forest(text: &str) -> Result<Vec<Spec>> {
    Parser::new(text).parse(false)
}

/// Parse exactly one spec
pub fn parse_single(text: &str) -> Result<Spec> {
    let mut forest = Parser::new(text).parse(false)?;
    match forest.len() {
        1 => Ok(forest.remove(0)),
        n => Err(Error::parse(
            text,
            0,
            format!("expected a single spec, found {}", n),
        )),
    }
}

/// Parse a constraint predicate, allowing an anonymous spec
/// (no leading name), e.g. `+cuda` or `@2.0: %gcc`
pub fn parse_predicate(text: &str) -> Result<Spec> {
    let mut forest = Parser::new(text).parse(true)?;
    match forest.len() {
        1 => Ok(forest.remove(0)),
        n => Err(Error::parse(
            text,
            0,
            format!("expected a single predicate, found {} specs", n),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Bare package name token
    Name(String),
    /// `@constraint`
    Version(String),
    /// `+name`
    VariantOn(String),
    /// `~name`
    VariantOff(String),
    /// `name=value`
    KeyValue(String, String),
    /// `%name` with optional `@constraint`
    Compiler(String, Option<String>),
    /// `^` with optional `[deptypes=...]` annotation
    Dependency(Option<DepTypes>),
}

struct Lexer<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn err(&self, offset: usize, message: impl Into<String>) -> Error {
        Error::parse(self.text, offset, message)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn is_name_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-'
    }

    fn is_version_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-' | b',' | b':')
    }

    fn is_value_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-' | b',' | b':' | b'+' | b'*' | b'/')
    }

    fn take_while(&mut self, pred: fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if pred(b)) {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    fn expect_name(&mut self, what: &str) -> Result<String> {
        let start = self.pos;
        let name = self.take_while(Self::is_name_byte);
        if name.is_empty() {
            return Err(self.err(start, format!("expected {}", what)));
        }
        Ok(name.to_string())
    }

    fn expect_version(&mut self, what: &str) -> Result<String> {
        let start = self.pos;
        let text = self.take_while(Self::is_version_byte);
        if text.is_empty() {
            return Err(self.err(start, format!("expected {}", what)));
        }
        Ok(text.to_string())
    }

    /// Read a bare or quoted value after `=`
    fn read_value(&mut self) -> Result<String> {
        let start = self.pos;
        match self.peek() {
            Some(quote @ (b'\'' | b'"')) => {
                self.pos += 1;
                let value_start = self.pos;
                while let Some(b) = self.peek() {
                    if b == quote {
                        let value = self.text[value_start..self.pos].to_string();
                        self.pos += 1;
                        return Ok(value);
                    }
                    self.pos += 1;
                }
                Err(self.err(start, "unterminated quoted value"))
            }
            _ => {
                let value = self.take_while(Self::is_value_byte);
                if value.is_empty() {
                    return Err(self.err(start, "expected value after '='"));
                }
                Ok(value.to_string())
            }
        }
    }

    /// Parse the `[deptypes=build,link]` annotation after `^`
    fn read_edge_properties(&mut self) -> Result<DepTypes> {
        let start = self.pos;
        self.pos += 1; // consume '['
        let key = self.expect_name("property name in edge annotation")?;
        if key != "deptypes" {
            return Err(self.err(start, format!("unknown edge property '{}'", key)));
        }
        if self.peek() != Some(b'=') {
            return Err(self.err(self.pos, "expected '=' after 'deptypes'"));
        }
        self.pos += 1;
        let value = self.take_while(|b| {
            b.is_ascii_alphanumeric() || b == b','
        });
        if self.peek() != Some(b']') {
            return Err(self.err(start, "unbalanced '[' in dependency annotation"));
        }
        self.pos += 1;

        let mut deptypes = DepTypes::empty();
        for part in value.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let t: DepType = part
                .parse()
                .map_err(|_| self.err(start, format!("unknown deptype '{}'", part)))?;
            deptypes = deptypes.union(DepTypes::from_type(t));
        }
        if deptypes.is_empty() {
            return Err(self.err(start, "empty deptype list"));
        }
        Ok(deptypes)
    }

    /// Next token, or None at end of input
    fn next_token(&mut self) -> Result<Option<(usize, Token)>> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(b) = self.peek() else {
            return Ok(None);
        };

        let token = match b {
            b'@' => {
                self.pos += 1;
                Token::Version(self.expect_version("version after '@'")?)
            }
            b'+' => {
                self.pos += 1;
                Token::VariantOn(self.expect_name("variant name after '+'")?)
            }
            b'~' => {
                self.pos += 1;
                Token::VariantOff(self.expect_name("variant name after '~'")?)
            }
            b'%' => {
                self.pos += 1;
                let name = self.expect_name("compiler name after '%'")?;
                let version = if self.peek() == Some(b'@') {
                    self.pos += 1;
                    Some(self.expect_version("compiler version after '@'")?)
                } else {
                    None
                };
                Token::Compiler(name, version)
            }
            b'^' => {
                self.pos += 1;
                let deptypes = if self.peek() == Some(b'[') {
                    Some(self.read_edge_properties()?)
                } else {
                    None
                };
                Token::Dependency(deptypes)
            }
            _ if Self::is_name_byte(b) => {
                let name = self.expect_name("name")?;
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Token::KeyValue(name, self.read_value()?)
                } else {
                    Token::Name(name)
                }
            }
            _ => {
                return Err(self.err(start, format!("unexpected character '{}'", b as char)));
            }
        };

        Ok(Some((start, token)))
    }
}

/// Where tokens currently apply: the latest root, or a dependency of it
enum Target {
    Root,
    Dep(usize),
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    forest: Vec<Spec>,
    target: Target,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lexer: Lexer::new(text),
            forest: Vec::new(),
            target: Target::Root,
        }
    }

    fn err(&self, offset: usize, message: impl Into<String>) -> Error {
        Error::parse(self.lexer.text, offset, message)
    }

    /// The spec tokens currently apply to
    fn current(&mut self, offset: usize, allow_anonymous: bool) -> Result<&mut Spec> {
        let text = self.lexer.text;
        if self.forest.is_empty() {
            if !allow_anonymous {
                return Err(self.err(offset, "expected a package name"));
            }
            self.forest.push(Spec::default());
        }
        let root = self
            .forest
            .last_mut()
            .ok_or_else(|| Error::parse(text, offset, "expected a package name"))?;
        match self.target {
            Target::Root => Ok(root),
            Target::Dep(i) => Ok(&mut root.dependencies[i].spec),
        }
    }

    fn parse(mut self, allow_anonymous: bool) -> Result<Vec<Spec>> {
        let text = self.lexer.text;
        while let Some((offset, token)) = self.lexer.next_token()? {
            match token {
                Token::Name(name) => {
                    self.forest.push(Spec::new(name));
                    self.target = Target::Root;
                }
                Token::Version(constraint_text) => {
                    let constraint = VersionConstraint::parse(&constraint_text)?;
                    let spec = self.current(offset, allow_anonymous)?;
                    if !spec.versions.is_any() {
                        return Err(Error::parse(text, offset, "duplicate version constraint"));
                    }
                    spec.versions = constraint;
                }
                Token::VariantOn(name) => {
                    self.set_variant(offset, allow_anonymous, name, VariantValue::Bool(true))?;
                }
                Token::VariantOff(name) => {
                    self.set_variant(offset, allow_anonymous, name, VariantValue::Bool(false))?;
                }
                Token::KeyValue(key, value) => {
                    if key == "arch" {
                        let arch = Arch::parse_value(&value).ok_or_else(|| {
                            Error::parse(
                                text,
                                offset,
                                format!(
                                    "invalid arch '{}' (expected os-target or platform-os-target)",
                                    value
                                ),
                            )
                        })?;
                        let spec = self.current(offset, allow_anonymous)?;
                        if !spec.arch.is_open() {
                            return Err(Error::parse(text, offset, "duplicate arch clause"));
                        }
                        spec.arch = arch;
                    } else {
                        let parsed = if value.contains(',') {
                            VariantValue::multi(value.split(','))
                        } else {
                            VariantValue::Single(value)
                        };
                        self.set_variant(offset, allow_anonymous, key, parsed)?;
                    }
                }
                Token::Compiler(name, version) => {
                    let versions = match version {
                        Some(text) => VersionConstraint::parse(&text)?,
                        None => VersionConstraint::any(),
                    };
                    let spec = self.current(offset, allow_anonymous)?;
                    if spec.compiler.is_some() {
                        return Err(Error::parse(text, offset, "duplicate compiler clause"));
                    }
                    spec.compiler = Some(CompilerSpec::with_versions(name, versions));
                }
                Token::Dependency(deptypes) => {
                    let name = match self.lexer.next_token()? {
                        Some((_, Token::Name(name))) => name,
                        _ => {
                            return Err(self.err(offset, "expected dependency name after '^'"));
                        }
                    };
                    if self.forest.is_empty() {
                        if !allow_anonymous {
                            return Err(self.err(offset, "dependency before any package name"));
                        }
                        self.forest.push(Spec::default());
                    }
                    let root = self
                        .forest
                        .last_mut()
                        .ok_or_else(|| Error::parse(text, offset, "dependency before any package name"))?;
                    root.dependencies.push(DepEdge {
                        spec: Spec::new(name),
                        deptypes: deptypes.unwrap_or_default(),
                    });
                    self.target = Target::Dep(root.dependencies.len() - 1);
                }
            }
        }
        Ok(self.forest)
    }

    fn set_variant(
        &mut self,
        offset: usize,
        allow_anonymous: bool,
        name: String,
        value: VariantValue,
    ) -> Result<()> {
        let text = self.lexer.text;
        let spec = self.current(offset, allow_anonymous)?;
        if spec.variants.contains_key(&name) {
            return Err(Error::parse(
                text,
                offset,
                format!("variant '{}' assigned twice", name),
            ));
        }
        spec.variants.insert(name, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name() {
        let spec = parse_single("zlib").unwrap();
        assert_eq!(spec.name, "zlib");
        assert!(spec.versions.is_any());
        assert!(spec.variants.is_empty());
        assert!(spec.compiler.is_none());
    }

    #[test]
    fn test_parse_full_clause_set() {
        let spec =
            parse_single("hdf5@1.12.0 +mpi ~shared api=v110 %gcc@12.2 arch=linux-rhel8-x86_64")
                .unwrap();
        assert_eq!(spec.name, "hdf5");
        assert_eq!(spec.versions.to_string(), "1.12.0");
        assert_eq!(spec.variant("mpi"), Some(&VariantValue::Bool(true)));
        assert_eq!(spec.variant("shared"), Some(&VariantValue::Bool(false)));
        assert_eq!(
            spec.variant("api"),
            Some(&VariantValue::Single("v110".to_string()))
        );
        let compiler = spec.compiler.as_ref().unwrap();
        assert_eq!(compiler.name, "gcc");
        assert_eq!(compiler.versions.to_string(), "12.2");
        assert_eq!(spec.arch.platform.as_deref(), Some("linux"));
    }

    #[test]
    fn test_parse_version_range_and_set() {
        let spec = parse_single("lib@1.0:1.5").unwrap();
        assert_eq!(spec.versions.to_string(), "1.0:1.5");
        let spec = parse_single("lib@1.0,2.0").unwrap();
        assert_eq!(spec.versions.to_string(), "1.0,2.0");
    }

    #[test]
    fn test_parse_dependencies_attach_to_anchor() {
        let spec = parse_single("app ^mpi @3: ^zlib@1.2.13 +shared").unwrap();
        assert_eq!(spec.name, "app");
        assert_eq!(spec.dependencies.len(), 2);
        assert_eq!(spec.dependencies[0].spec.name, "mpi");
        assert_eq!(spec.dependencies[0].spec.versions.to_string(), "3:");
        assert_eq!(spec.dependencies[1].spec.name, "zlib");
        assert_eq!(
            spec.dependencies[1].spec.variant("shared"),
            Some(&VariantValue::Bool(true))
        );
    }

    #[test]
    fn test_parse_deptype_annotation() {
        let spec = parse_single("app ^[deptypes=build,test]cmake").unwrap();
        let edge = &spec.dependencies[0];
        assert_eq!(edge.spec.name, "cmake");
        assert_eq!(edge.deptypes, DepTypes::BUILD | DepTypes::TEST);
    }

    #[test]
    fn test_parse_forest_multiple_roots() {
        let forest = parse_forest("app ^zlib other@2.0").unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].name, "app");
        assert_eq!(forest[0].dependencies.len(), 1);
        assert_eq!(forest[1].name, "other");
    }

    #[test]
    fn test_parse_quoted_value() {
        let spec = parse_single("pkg cflags=\"-O2 -g\"").unwrap();
        assert_eq!(
            spec.variant("cflags"),
            Some(&VariantValue::Single("-O2 -g".to_string()))
        );
    }

    #[test]
    fn test_parse_multi_value_variant() {
        let spec = parse_single("trilinos packages=epetra,tpetra").unwrap();
        assert_eq!(
            spec.variant("packages"),
            Some(&VariantValue::multi(["epetra", "tpetra"]))
        );
    }

    #[test]
    fn test_parse_predicate_anonymous() {
        let cond = parse_predicate("+cuda").unwrap();
        assert!(cond.name.is_empty());
        assert_eq!(cond.variant("cuda"), Some(&VariantValue::Bool(true)));

        let cond = parse_predicate("@2.0: %gcc").unwrap();
        assert_eq!(cond.versions.to_string(), "2.0:");
        assert_eq!(cond.compiler.as_ref().unwrap().name, "gcc");
    }

    #[test]
    fn test_parse_error_unterminated_quote() {
        let err = parse_single("pkg cflags=\"-O2").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_parse_error_unbalanced_bracket() {
        let err = parse_single("app ^[deptypes=build zlib").unwrap_err();
        assert!(err.to_string().contains("unbalanced"));
    }

    #[test]
    fn test_parse_error_empty_deptypes() {
        assert!(parse_single("app ^[deptypes=]zlib").is_err());
    }

    #[test]
    fn test_parse_error_unknown_token() {
        assert!(parse_single("app ?").is_err());
    }

    #[test]
    fn test_parse_error_dangling_dependency() {
        assert!(parse_single("app ^").is_err());
        assert!(parse_forest("^zlib").is_err());
    }

    #[test]
    fn test_parse_error_clause_before_name() {
        assert!(parse_forest("@1.2 app").is_err());
    }

    #[test]
    fn test_parse_error_duplicate_clauses() {
        assert!(parse_single("app@1.0 @2.0").is_err());
        assert!(parse_single("app +x +x").is_err());
        assert!(parse_single("app %gcc %clang").is_err());
    }

    #[test]
    fn test_roundtrip_structural_equality() {
        let inputs = [
            "zlib",
            "hdf5@1.12.0 +mpi ~shared api=v110 %gcc@12.2 arch=linux-rhel8-x86_64",
            "app ^mpi@3: ^[deptypes=build,test]cmake@3.20:",
            "trilinos packages=epetra,tpetra ^lib@1.0:1.5",
        ];
        for input in inputs {
            let spec = parse_single(input).unwrap();
            let printed = spec.to_string();
            let reparsed = parse_single(&printed).unwrap();
            assert_eq!(spec, reparsed, "round-trip failed for {:?}", input);
        }
    }
}
