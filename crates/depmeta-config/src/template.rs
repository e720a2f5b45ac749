//! Minimal `$(( ... ))` template engine.
//!
//! Supported actions:
//!
//! | Action | Output |
//! |--------|--------|
//! | `.Root` | the server root |
//! | `.PushState` | `true` / `false` |
//! | `if <field>` ... `else` ... `end` | conditional block |
//!
//! `$((-` trims whitespace before the action, `-))` trims whitespace after it.
//! The dash must be separated from the action by a space, tab, CR or newline.
//! Anything else between the delimiters is a parse error.

use crate::error::TemplateError;

const OPEN: &str = "$((";
const CLOSE: &str = "))";

/// Values available to a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NginxConfig {
    pub root: String,
    pub push_state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Root,
    PushState,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            ".Root" => Some(Self::Root),
            ".PushState" => Some(Self::PushState),
            _ => None,
        }
    }

    fn render(self, data: &NginxConfig) -> String {
        match self {
            Self::Root => data.root.clone(),
            Self::PushState => data.push_state.to_string(),
        }
    }

    fn truthy(self, data: &NginxConfig) -> bool {
        match self {
            Self::Root => !data.root.is_empty(),
            Self::PushState => data.push_state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Field(Field),
    If {
        cond: Field,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug)]
enum Token {
    Text(String),
    Action { body: String, line: usize },
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let tokens = lex(source)?;
        let mut tokens = tokens.into_iter();
        let (nodes, terminator) = parse_block(&mut tokens)?;
        match terminator {
            None => Ok(Self { nodes }),
            Some((action, line)) => Err(TemplateError::Unexpected { action, line }),
        }
    }

    pub fn render(&self, data: &NginxConfig) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, data, &mut out);
        out
    }
}

fn lex(source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut trim_next = false;
    let mut line = 1;

    while let Some(start) = rest.find(OPEN) {
        let mut text = &rest[..start];
        if trim_next {
            text = text.trim_start();
        }
        line += rest[..start].matches('\n').count();

        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or(TemplateError::Unclosed { line })?;
        let mut body = &after_open[..end];

        if let Some(stripped) = body
            .strip_prefix('-')
            .filter(|rest| rest.starts_with(is_trim_space))
        {
            text = text.trim_end();
            body = stripped;
        }
        trim_next = false;
        if let Some(stripped) = body
            .strip_suffix('-')
            .filter(|rest| rest.ends_with(is_trim_space))
        {
            trim_next = true;
            body = stripped;
        }

        if !text.is_empty() {
            tokens.push(Token::Text(text.to_string()));
        }
        tokens.push(Token::Action {
            body: body.trim().to_string(),
            line,
        });

        line += after_open[..end].matches('\n').count();
        rest = &after_open[end + CLOSE.len()..];
    }

    let tail = if trim_next { rest.trim_start() } else { rest };
    if !tail.is_empty() {
        tokens.push(Token::Text(tail.to_string()));
    }
    Ok(tokens)
}

/// Whitespace that must separate a trim marker from the action.
fn is_trim_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Parse nodes until `else`/`end` (returned as terminator) or end of input.
fn parse_block(
    tokens: &mut impl Iterator<Item = Token>,
) -> Result<(Vec<Node>, Option<(String, usize)>), TemplateError> {
    let mut nodes = Vec::new();

    while let Some(token) = tokens.next() {
        let (body, line) = match token {
            Token::Text(text) => {
                nodes.push(Node::Text(text));
                continue;
            }
            Token::Action { body, line } => (body, line),
        };

        if body == "else" || body == "end" {
            return Ok((nodes, Some((body, line))));
        }

        if let Some(cond) = body.strip_prefix("if ") {
            let cond = Field::parse(cond.trim()).ok_or_else(|| TemplateError::UnknownAction {
                action: body.clone(),
                line,
            })?;

            let (then, terminator) = parse_block(tokens)?;
            let otherwise = match terminator {
                Some((kind, _)) if kind == "end" => Vec::new(),
                Some((kind, else_line)) if kind == "else" => {
                    let (otherwise, terminator) = parse_block(tokens)?;
                    match terminator {
                        Some((kind, _)) if kind == "end" => otherwise,
                        _ => return Err(TemplateError::UnterminatedIf { line: else_line }),
                    }
                }
                _ => return Err(TemplateError::UnterminatedIf { line }),
            };

            nodes.push(Node::If {
                cond,
                then,
                otherwise,
            });
            continue;
        }

        let field = Field::parse(&body).ok_or_else(|| TemplateError::UnknownAction {
            action: body.clone(),
            line,
        })?;
        nodes.push(Node::Field(field));
    }

    Ok((nodes, None))
}

fn render_nodes(nodes: &[Node], data: &NginxConfig, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(field) => out.push_str(&field.render(data)),
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                if cond.truthy(data) {
                    render_nodes(then, data, out);
                } else {
                    render_nodes(otherwise, data, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(push_state: bool) -> NginxConfig {
        NginxConfig {
            root: "/workspace/public".to_string(),
            push_state,
        }
    }

    #[test]
    fn substitutes_fields() {
        let t = Template::parse("root $(( .Root ));\n# push_state=$((.PushState))\n").unwrap();
        assert_eq!(
            t.render(&data(true)),
            "root /workspace/public;\n# push_state=true\n"
        );
    }

    #[test]
    fn conditional_block() {
        let src = "a\n$(( if .PushState ))rewrite;\n$(( else ))static;\n$(( end ))b\n";
        let t = Template::parse(src).unwrap();
        assert_eq!(t.render(&data(true)), "a\nrewrite;\nb\n");
        assert_eq!(t.render(&data(false)), "a\nstatic;\nb\n");
    }

    #[test]
    fn trim_markers() {
        let src = "location / {\n    $((- if .PushState -))\n    try_files;\n    $((- end ))\n}";
        let t = Template::parse(src).unwrap();
        assert_eq!(t.render(&data(true)), "location / {try_files;\n}");
        assert_eq!(t.render(&data(false)), "location / {\n}");
    }

    #[test]
    fn trim_markers_accept_any_separator() {
        let t = Template::parse("a\n$((-\tif .PushState ))x$(( end ))").unwrap();
        assert_eq!(t.render(&data(true)), "ax");
        assert_eq!(t.render(&data(false)), "a");

        let t = Template::parse("root\n$((-\n.Root ))\n").unwrap();
        assert_eq!(t.render(&data(false)), "root/workspace/public\n");

        let t = Template::parse("$(( .Root\r\n-))\n  ;").unwrap();
        assert_eq!(t.render(&data(false)), "/workspace/public;");
    }

    #[test]
    fn dash_without_separator_is_not_a_trim_marker() {
        assert!(matches!(
            Template::parse("a $((-.Root ))"),
            Err(TemplateError::UnknownAction { .. })
        ));
    }

    #[test]
    fn text_without_actions_passes_through() {
        let src = "worker_processes 1; # {{ env \"PORT\" }}\n";
        assert_eq!(Template::parse(src).unwrap().render(&data(false)), src);
    }

    #[test]
    fn unknown_action_rejected() {
        let err = Template::parse("line\n$(( .Port ))").unwrap_err();
        match err {
            TemplateError::UnknownAction { action, line } => {
                assert_eq!(action, ".Port");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn structural_errors() {
        assert!(matches!(
            Template::parse("$(( .Root )"),
            Err(TemplateError::Unclosed { .. })
        ));
        assert!(matches!(
            Template::parse("$(( if .PushState ))x"),
            Err(TemplateError::UnterminatedIf { .. })
        ));
        assert!(matches!(
            Template::parse("x$(( end ))"),
            Err(TemplateError::Unexpected { .. })
        ));
    }
}
