//! Parses and emits the declarative `config`/`option`/`list` text format:
//!
//! ```text
//! config <type> [<name>]
//!     option <key> <value>
//!     list <key> <value>
//! ```
//!
//! The grammar is small and line-oriented enough that a hand-rolled
//! tokenizer reads more plainly here than pulling in a parser-combinator
//! crate for it.

use std::path::Path;

use indexmap::IndexMap;

use crate::error::{Result, RouterConfigError};
use crate::model::{Config, Section, Value};

/// Parses the text of one configuration file into a [`Config`].
pub fn parse(text: &str, path: &Path) -> Result<Config> {
    let mut config = Config::new();
    let mut current: Option<Section> = None;
    // tracks, per option key in the current section, whether it was first
    // declared as `option` or `list` -> KindTypeConflict
    let mut declared_kind: IndexMap<String, DeclaredKind> = IndexMap::new();

    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let tokens = tokenize(line, path, lineno + 1)?;
        if tokens.is_empty() {
            continue;
        }

        match tokens[0].as_str() {
            "config" => {
                if let Some(section) = current.take() {
                    push_section(&mut config, section);
                }
                declared_kind.clear();

                let kind = tokens.get(1).ok_or_else(|| RouterConfigError::Syntax {
                    path: path.to_path_buf(),
                    message: format!("line {}: 'config' requires a type", lineno + 1),
                })?;
                let name = tokens.get(2).cloned();
                current = Some(Section::new(kind.clone(), name));
            }
            "option" => {
                let section = current.as_mut().ok_or_else(|| RouterConfigError::Syntax {
                    path: path.to_path_buf(),
                    message: format!("line {}: 'option' outside of a config block", lineno + 1),
                })?;
                let (key, value) = option_kv(&tokens, path, lineno + 1)?;
                set_scalar(section, &mut declared_kind, key, value, path, lineno + 1)?;
            }
            "list" => {
                let section = current.as_mut().ok_or_else(|| RouterConfigError::Syntax {
                    path: path.to_path_buf(),
                    message: format!("line {}: 'list' outside of a config block", lineno + 1),
                })?;
                let (key, value) = option_kv(&tokens, path, lineno + 1)?;
                append_list(section, &mut declared_kind, key, value, path, lineno + 1)?;
            }
            other => {
                return Err(RouterConfigError::Syntax {
                    path: path.to_path_buf(),
                    message: format!("line {}: unknown statement '{other}'", lineno + 1),
                });
            }
        }
    }

    if let Some(section) = current.take() {
        push_section(&mut config, section);
    }

    config.validate()?;
    Ok(config)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DeclaredKind {
    Option,
    List,
}

fn push_section(config: &mut Config, section: Section) {
    config.sections.push(section);
}

fn option_kv(tokens: &[String], path: &Path, lineno: usize) -> Result<(String, String)> {
    let key = tokens.get(1).ok_or_else(|| RouterConfigError::Syntax {
        path: path.to_path_buf(),
        message: format!("line {lineno}: missing option key"),
    })?;
    let value = tokens.get(2).ok_or_else(|| RouterConfigError::Syntax {
        path: path.to_path_buf(),
        message: format!("line {lineno}: missing value for option '{key}'"),
    })?;
    Ok((key.clone(), value.clone()))
}

fn set_scalar(
    section: &mut Section,
    declared: &mut IndexMap<String, DeclaredKind>,
    key: String,
    value: String,
    path: &Path,
    lineno: usize,
) -> Result<()> {
    match declared.get(&key) {
        Some(DeclaredKind::List) => {
            return Err(RouterConfigError::TypeConflict {
                config: path.display().to_string(),
                section: section.name.clone().unwrap_or_default(),
                option: key,
            });
        }
        Some(DeclaredKind::Option) => {
            return Err(RouterConfigError::Syntax {
                path: path.to_path_buf(),
                message: format!("line {lineno}: duplicate option '{key}'"),
            });
        }
        None => {}
    }
    declared.insert(key.clone(), DeclaredKind::Option);
    if let Some(meta_key) = key.strip_prefix('.') {
        section.meta.insert(meta_key.to_string(), value);
    } else {
        section.options.insert(key, Value::Scalar(value));
    }
    Ok(())
}

fn append_list(
    section: &mut Section,
    declared: &mut IndexMap<String, DeclaredKind>,
    key: String,
    value: String,
    path: &Path,
    _lineno: usize,
) -> Result<()> {
    match declared.get(&key) {
        Some(DeclaredKind::Option) => {
            return Err(RouterConfigError::TypeConflict {
                config: path.display().to_string(),
                section: section.name.clone().unwrap_or_default(),
                option: key,
            });
        }
        _ => {
            declared.insert(key.clone(), DeclaredKind::List);
        }
    }
    match section.options.entry(key).or_insert_with(|| Value::List(Vec::new())) {
        Value::List(values) => values.push(value),
        Value::Scalar(_) => unreachable!("declared_kind guards against this"),
    }
    Ok(())
}

/// Splits a line into whitespace-separated tokens, honoring single- and
/// double-quoted tokens (with `\\`, `\'`, `\"` unescaped) and leaving
/// unquoted tokens as-is.
fn tokenize(line: &str, path: &Path, lineno: usize) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            chars.next();
            let mut token = String::new();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(next) => token.push(next),
                        None => {
                            return Err(RouterConfigError::Syntax {
                                path: path.to_path_buf(),
                                message: format!("line {lineno}: dangling escape"),
                            });
                        }
                    },
                    Some(ch) if ch == quote => break,
                    Some(ch) => token.push(ch),
                    None => {
                        return Err(RouterConfigError::Syntax {
                            path: path.to_path_buf(),
                            message: format!("line {lineno}: unterminated quoted value"),
                        });
                    }
                }
            }
            tokens.push(token);
        } else {
            let mut token = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
            tokens.push(token);
        }
    }

    Ok(tokens)
}

/// Emits a [`Config`] back to its textual form.
pub fn emit(config: &Config) -> String {
    let mut out = String::new();

    for section in &config.sections {
        out.push_str("config ");
        out.push_str(&section.kind);
        if let Some(name) = &section.name {
            out.push(' ');
            out.push_str(&quote(name));
        }
        out.push('\n');

        for (key, value) in &section.meta {
            out.push_str(&format!("\toption '.{}' {}\n", key, quote(value)));
        }

        for (key, value) in &section.options {
            match value {
                Value::Scalar(s) => {
                    out.push_str(&format!("\toption {} {}\n", key, quote(s)));
                }
                Value::List(items) => {
                    // Invariant 4: empty lists are semantically absent, never emitted.
                    for item in items {
                        out.push_str(&format!("\tlist {} {}\n", key, quote(item)));
                    }
                }
            }
        }

        out.push('\n');
    }

    out
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn p() -> PathBuf {
        PathBuf::from("firewall")
    }

    #[test]
    fn parse_round_trip_is_stable() {
        let text = "config zone 'lan'\n\toption input 'ACCEPT'\n\tlist network 'lan'\n\tlist network 'guest'\n\n";
        let config = parse(text, &p()).unwrap();
        let emitted = emit(&config);
        let reparsed = parse(&emitted, &p()).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn list_after_option_same_key_conflicts() {
        let text = "config zone 'lan'\n\toption network 'lan'\n\tlist network 'guest'\n";
        let err = parse(text, &p()).unwrap_err();
        assert!(matches!(err, RouterConfigError::TypeConflict { .. }));
    }

    #[test]
    fn option_after_list_same_key_conflicts() {
        let text = "config zone 'lan'\n\tlist network 'lan'\n\toption network 'guest'\n";
        let err = parse(text, &p()).unwrap_err();
        assert!(matches!(err, RouterConfigError::TypeConflict { .. }));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = "# a comment\n\nconfig zone 'lan'\n\t# another comment\n\toption input 'ACCEPT'\n";
        let config = parse(text, &p()).unwrap();
        assert_eq!(config.sections.len(), 1);
    }

    #[test]
    fn anonymous_sections_indexed_positionally() {
        let text = "config rule\n\toption target 'ACCEPT'\n\nconfig rule\n\toption target 'DROP'\n";
        let config = parse(text, &p()).unwrap();
        assert_eq!(config.find_anonymous("rule", 0).unwrap().options["target"], Value::Scalar("ACCEPT".into()));
        assert_eq!(config.find_anonymous("rule", 1).unwrap().options["target"], Value::Scalar("DROP".into()));
    }

    #[test]
    fn missing_config_header_is_syntax_error() {
        let text = "option foo 'bar'\n";
        let err = parse(text, &p()).unwrap_err();
        assert!(matches!(err, RouterConfigError::Syntax { .. }));
    }

    #[test]
    fn escaped_quotes_round_trip() {
        let text = "config zone 'lan'\n\toption comment 'it\\'s fine'\n";
        let config = parse(text, &p()).unwrap();
        assert_eq!(
            config.sections[0].options["comment"],
            Value::Scalar("it's fine".into())
        );
        let emitted = emit(&config);
        assert_eq!(parse(&emitted, &p()).unwrap(), config);
    }

    #[test]
    fn duplicate_section_name_fails_validation() {
        let text = "config zone 'lan'\n\toption input 'ACCEPT'\n\nconfig zone 'lan'\n\toption input 'DROP'\n";
        let err = parse(text, &p()).unwrap_err();
        assert!(matches!(err, RouterConfigError::Validation { .. }));
    }
}
