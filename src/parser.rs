//! Python import extraction
//!
//! Parses Python source with tree-sitter and collects every `import` and
//! `from ... import ...` statement, wherever it appears (module level,
//! inside functions, under `if TYPE_CHECKING:` and so on). Public top-level
//! class names are collected alongside for the abstractness metric.

use std::cell::RefCell;

use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

/// Errors that can occur while parsing a Python file
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to load Python grammar: {0}")]
    Language(String),

    #[error("parser produced no syntax tree")]
    Failed,

    #[error("syntax error near line {line}")]
    Syntax { line: usize },
}

/// A statically extracted import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSpec {
    /// `import a.b, c as d`
    Direct { names: Vec<String> },
    /// `from ..pkg import x, y` (level counts the leading dots)
    From {
        module: String,
        names: Vec<String>,
        level: usize,
    },
}

/// Imports and public top-level classes of one source file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSource {
    pub imports: Vec<ImportSpec>,
    /// Top-level class names not starting with `_`, in source order
    pub classes: Vec<String>,
}

/// A reusable tree-sitter parser configured for Python
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ParseError::Language(e.to_string()))?;
        Ok(Self { parser })
    }

    /// Parse source into a syntax tree, rejecting trees with error nodes
    pub fn parse(&mut self, source: &str) -> Result<Tree, ParseError> {
        let tree = self.parser.parse(source, None).ok_or(ParseError::Failed)?;
        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(0);
            return Err(ParseError::Syntax { line });
        }
        Ok(tree)
    }

    /// Parse source and extract its imports
    pub fn parse_imports(&mut self, source: &str) -> Result<Vec<ImportSpec>, ParseError> {
        let tree = self.parse(source)?;
        Ok(extract_imports(&tree, source))
    }

    /// Parse source and extract imports and public classes
    pub fn parse_source(&mut self, source: &str) -> Result<ParsedSource, ParseError> {
        let tree = self.parse(source)?;
        Ok(ParsedSource {
            imports: extract_imports(&tree, source),
            classes: extract_public_classes(&tree, source),
        })
    }
}

thread_local! {
    static PARSER: RefCell<Option<PythonParser>> = const { RefCell::new(None) };
}

/// Run `f` with a parser owned by the current thread
///
/// Each rayon worker lazily builds its own parser on first use.
fn with_parser<T>(
    f: impl FnOnce(&mut PythonParser) -> Result<T, ParseError>,
) -> Result<T, ParseError> {
    PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(PythonParser::new()?);
        }
        let parser = slot.as_mut().ok_or(ParseError::Failed)?;
        f(parser)
    })
}

/// Extract imports using the thread's parser
pub fn parse_imports(source: &str) -> Result<Vec<ImportSpec>, ParseError> {
    with_parser(|parser| parser.parse_imports(source))
}

/// Extract imports and public classes using the thread's parser
pub fn parse_source(source: &str) -> Result<ParsedSource, ParseError> {
    with_parser(|parser| parser.parse_source(source))
}

fn first_error_line(root: Node) -> Option<usize> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row + 1);
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    None
}

/// Collect import statements from a parsed tree in source order
pub fn extract_imports(tree: &Tree, source: &str) -> Vec<ImportSpec> {
    let bytes = source.as_bytes();
    let mut imports = Vec::new();
    let mut stack = vec![tree.root_node()];

    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => {
                let names = imported_names(node, bytes);
                if !names.is_empty() {
                    imports.push(ImportSpec::Direct { names });
                }
                continue;
            }
            "import_from_statement" => {
                imports.push(from_import(node, bytes));
                continue;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    imports
}

/// Names of public classes defined at module level, decorated or not
pub fn extract_public_classes(tree: &Tree, source: &str) -> Vec<String> {
    let bytes = source.as_bytes();
    let root = tree.root_node();
    let mut cursor = root.walk();

    root.named_children(&mut cursor)
        .filter_map(|node| match node.kind() {
            "class_definition" => Some(node),
            "decorated_definition" => node
                .child_by_field_name("definition")
                .filter(|def| def.kind() == "class_definition"),
            _ => None,
        })
        .filter_map(|class| class.child_by_field_name("name"))
        .map(|name| text(name, bytes))
        .filter(|name| !name.is_empty() && !name.starts_with('_'))
        .collect()
}

fn from_import(node: Node, source: &[u8]) -> ImportSpec {
    let mut module = String::new();
    let mut level = 0;

    if let Some(module_node) = node.child_by_field_name("module_name") {
        if module_node.kind() == "relative_import" {
            let mut cursor = module_node.walk();
            for child in module_node.children(&mut cursor) {
                match child.kind() {
                    "import_prefix" => {
                        level = text(child, source).chars().filter(|c| *c == '.').count();
                    }
                    "dotted_name" => module = text(child, source),
                    _ => {}
                }
            }
        } else {
            module = text(module_node, source);
        }
    }

    let mut names = imported_names(node, source);

    let mut cursor = node.walk();
    if node
        .children(&mut cursor)
        .any(|child| child.kind() == "wildcard_import")
    {
        names.push("*".to_string());
    }

    ImportSpec::From {
        module,
        names,
        level,
    }
}

/// Names bound by the `name` fields of an import statement
fn imported_names(node: Node, source: &[u8]) -> Vec<String> {
    let mut cursor = node.walk();
    node.children_by_field_name("name", &mut cursor)
        .filter_map(|child| match child.kind() {
            "aliased_import" => child.child_by_field_name("name"),
            _ => Some(child),
        })
        .map(|name| text(name, source))
        .filter(|name| !name.is_empty())
        .collect()
}

fn text(node: Node, source: &[u8]) -> String {
    node.utf8_text(source)
        .map(|s| s.split_whitespace().collect::<String>())
        .unwrap_or_default()
}
