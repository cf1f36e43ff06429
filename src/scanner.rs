//! Function scanner — character-level state machine over the HLSL-like
//! library grammar.
//!
//! Only knows enough of the grammar to locate function boundaries and
//! argument lists: a run of `//` lines directly above a signature becomes
//! the function comment, `#` lines at global scope are skipped, and the
//! body is captured as opaque text between the outermost braces.

use crate::model::SourceFunction;
use std::fmt;

/// Fatal scan failure. No functions are returned for the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Something other than `{` followed the argument list.
    MissingOpenBrace { function: String },
    /// Brace depth went negative inside a function body.
    TooManyClosingBraces { function: String },
    /// Input ended inside a signature or body.
    UnexpectedEof,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingOpenBrace { function } => {
                write!(f, "invalid function body for {function}: missing {{")
            }
            ParseError::TooManyClosingBraces { function } => {
                write!(f, "invalid function body for {function}: too many }}")
            }
            ParseError::UnexpectedEof => write!(f, "parsing error: unexpected end of file"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    Preprocessor,
    FunctionComment,
    FunctionReturn,
    FunctionName,
    FunctionArgs,
    FunctionBodyStart,
    FunctionBody,
}

/// Scan a library file into its function definitions, in file order.
///
/// `accurate_errors` controls whether the opening-brace line is recorded
/// on each function (it feeds `#line` remapping and the fingerprint).
pub fn scan(text: &str, accurate_errors: bool) -> Result<Vec<SourceFunction>, ParseError> {
    // Simplify line break handling
    let text = text.replace("\r\n", "\n");
    let chars: Vec<char> = text.chars().collect();

    let mut scope = Scope::Global;
    let mut index = 0usize;
    let mut scope_depth = 0i32;
    let mut paren_depth = 0i32;
    let mut bracket_depth = 0i32;
    let mut line_number = 0usize;

    let mut functions: Vec<SourceFunction> = Vec::new();

    while index < chars.len() {
        let c = chars[index];
        index += 1;

        if c == '\n' {
            line_number += 1;
        }

        match scope {
            Scope::Global => {
                debug_assert_eq!(scope_depth, 0);
                debug_assert_eq!(paren_depth, 0);

                if c == '\n' {
                    // A blank line with no signature discards a pending comment
                    if functions.last().is_some_and(|f| f.return_type.is_empty()) {
                        functions.pop();
                    }
                    continue;
                }
                if c.is_whitespace() {
                    continue;
                }

                if functions.last().is_none_or(|f| !f.return_type.is_empty()) {
                    functions.push(SourceFunction::default());
                }
                // Reprocess this character in the new state
                index -= 1;

                scope = if c == '#' {
                    Scope::Preprocessor
                } else if c == '/' {
                    Scope::FunctionComment
                } else {
                    Scope::FunctionReturn
                };
            }
            Scope::Preprocessor => {
                if c == '\n' {
                    scope = Scope::Global;
                }
            }
            Scope::FunctionComment => {
                let function = functions.last_mut().expect("entry pushed in Global");
                if c != '\n' {
                    function.comment.push(c);
                    continue;
                }
                function.comment.push('\n');
                scope = Scope::Global;
            }
            Scope::FunctionReturn => {
                if !c.is_whitespace() {
                    functions.last_mut().expect("entry exists").return_type.push(c);
                    continue;
                }
                scope = Scope::FunctionName;
            }
            Scope::FunctionName => {
                if c != '(' {
                    if !c.is_whitespace() {
                        functions.last_mut().expect("entry exists").name.push(c);
                    }
                    continue;
                }
                scope = Scope::FunctionArgs;
                paren_depth = 1;
                bracket_depth = 0;
            }
            Scope::FunctionArgs => {
                match c {
                    '(' => paren_depth += 1,
                    ')' => paren_depth -= 1,
                    '[' => bracket_depth += 1,
                    ']' => bracket_depth -= 1,
                    _ => {}
                }

                if paren_depth > 0 {
                    let function = functions.last_mut().expect("entry exists");
                    // A top-level comma starts a new argument; commas nested
                    // in parentheses or metadata brackets are kept as text
                    if c == ',' && bracket_depth == 0 && paren_depth == 1 {
                        function.arguments.push(String::new());
                    } else {
                        if function.arguments.is_empty() {
                            function.arguments.push(String::new());
                        }
                        function.arguments.last_mut().expect("just pushed").push(c);
                    }
                    continue;
                }

                scope = Scope::FunctionBodyStart;
            }
            Scope::FunctionBodyStart => {
                debug_assert_eq!(scope_depth, 0);

                if c.is_whitespace() {
                    continue;
                }
                if c != '{' {
                    return Err(ParseError::MissingOpenBrace {
                        function: functions.last().expect("entry exists").name.clone(),
                    });
                }

                if accurate_errors {
                    functions.last_mut().expect("entry exists").start_line = line_number;
                }

                scope = Scope::FunctionBody;
                scope_depth = 1;
            }
            Scope::FunctionBody => {
                debug_assert!(scope_depth > 0);

                if c == '{' {
                    scope_depth += 1;
                }
                if c == '}' {
                    scope_depth -= 1;
                }

                if scope_depth > 0 {
                    functions.last_mut().expect("entry exists").body.push(c);
                    continue;
                }
                if scope_depth < 0 {
                    return Err(ParseError::TooManyClosingBraces {
                        function: functions.last().expect("entry exists").name.clone(),
                    });
                }

                scope = Scope::Global;
            }
        }
    }

    if scope == Scope::FunctionComment {
        // A commented-out function at the end of the file is fine
        if functions.last().is_some_and(|f| f.return_type.is_empty()) {
            functions.pop();
            scope = Scope::Global;
        }
    }
    if scope == Scope::Global {
        // Same for a trailing comment followed by a final newline
        if functions.last().is_some_and(|f| f.return_type.is_empty()) {
            functions.pop();
        }
    }

    if scope != Scope::Global {
        return Err(ParseError::UnexpectedEof);
    }
    debug_assert_eq!(scope_depth, 0);
    debug_assert_eq!(paren_depth, 0);

    Ok(functions)
}
