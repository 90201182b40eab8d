//! The reader turns source text into values. It only goes through the construction operations of
//! the machine: lists are consed, numbers are immediates and every other token becomes a symbol
//! encoded as a byte chain. The reader main function is [read].

use std::{iter::Peekable, str::CharIndices};

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::chain::ChainError;
use crate::machine::Machine;
use crate::value::Value;

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("unmatched parenthesis")]
    #[diagnostic(code(dabble::read::unmatched_parenthesis))]
    UnmatchedParenthesis {
        #[label("this parenthesis closes nothing")]
        span: SourceSpan,
    },

    #[error("unclosed parenthesis")]
    #[diagnostic(code(dabble::read::unclosed_parenthesis))]
    UnclosedParenthesis {
        #[label("this list is never closed")]
        span: SourceSpan,
    },

    #[error("unmatched quote")]
    #[diagnostic(code(dabble::read::unmatched_quote))]
    UnmatchedQuote {
        #[label("this quote has nothing to quote")]
        span: SourceSpan,
    },

    #[error("integer '{literal}' does not fit in 32 bits")]
    #[diagnostic(code(dabble::read::number_out_of_range))]
    NumberOutOfRange {
        literal: String,
        #[label("out of range")]
        span: SourceSpan,
    },

    #[error("invalid symbol '{name}': {reason}")]
    #[diagnostic(code(dabble::read::invalid_symbol))]
    InvalidSymbol {
        name: String,
        reason: ChainError,
        #[label("here")]
        span: SourceSpan,
    },
}

pub type Result<T, E = ReadError> = std::result::Result<T, E>;

/// A mutable object that keeps track of where the reader is.
struct State<'a, 'm> {
    machine: &'m mut Machine,
    input: &'a str,
    peekable: Peekable<CharIndices<'a>>,
    stack: Vec<Value>,
    /// Stack length and offset of every open parenthesis.
    indices: Vec<(usize, usize)>,
    /// Offset of every pending quote and the nesting it was read at.
    quotes: Vec<(usize, usize)>,
}

impl<'a, 'm> State<'a, 'm> {
    fn new(machine: &'m mut Machine, input: &'a str) -> Self {
        Self {
            machine,
            input,
            peekable: input.char_indices().peekable(),
            stack: Vec::new(),
            indices: Vec::new(),
            quotes: Vec::new(),
        }
    }

    fn open(&mut self, offset: usize) {
        self.indices.push((self.stack.len(), offset));
    }

    fn close(&mut self, offset: usize) -> Result<()> {
        if let Some(&(_, quote)) = self.quotes.last() {
            if self.quotes_at_this_depth() {
                return Err(ReadError::UnmatchedQuote {
                    span: (quote, 1).into(),
                });
            }
        }

        let Some((start, _)) = self.indices.pop() else {
            return Err(ReadError::UnmatchedParenthesis {
                span: (offset, 1).into(),
            });
        };

        let items = self.stack.split_off(start);
        let list = self.machine.list(&items);
        self.stack.push(list);
        Ok(())
    }

    fn quotes_at_this_depth(&self) -> bool {
        matches!(self.quotes.last(), Some(&(depth, _)) if depth == self.indices.len())
    }

    /// Wraps the datum just read in every quote waiting for it.
    fn prefix_close(&mut self) -> Result<()> {
        while self.quotes_at_this_depth() {
            let Some(datum) = self.stack.pop() else {
                break;
            };
            self.quotes.pop();

            let quote = self.symbol("quote", 0)?;
            let quoted = self.machine.list(&[quote, datum]);
            self.stack.push(quoted);
        }

        Ok(())
    }

    fn symbol(&mut self, name: &str, offset: usize) -> Result<Value> {
        self.machine
            .symbol(name)
            .map_err(|reason| ReadError::InvalidSymbol {
                name: name.to_string(),
                reason,
                span: (offset, name.len()).into(),
            })
    }

    fn accumulate_while<F>(&mut self, start: usize, mut f: F) -> &'a str
    where
        F: FnMut(char) -> bool,
    {
        let input = self.input;
        let mut end = input.len();

        while let Some(&(offset, chr)) = self.peekable.peek() {
            if f(chr) {
                self.peekable.next();
            } else {
                end = offset;
                break;
            }
        }

        &input[start..end]
    }

    fn read(&mut self) -> Result<Vec<Value>> {
        while let Some((offset, chr)) = self.peekable.next() {
            match chr {
                chr if chr.is_whitespace() => continue,
                ';' => {
                    self.accumulate_while(offset, |c| c != '\n');
                    continue;
                }
                '\'' => {
                    self.quotes.push((self.indices.len(), offset));
                    continue;
                }
                '(' => {
                    self.open(offset);
                    continue;
                }
                ')' => self.close(offset)?,
                _ => self.parse_atom(offset)?,
            }
            self.prefix_close()?;
        }

        if let Some(&(_, offset)) = self.quotes.last() {
            return Err(ReadError::UnmatchedQuote {
                span: (offset, 1).into(),
            });
        }

        if let Some(&(_, offset)) = self.indices.last() {
            return Err(ReadError::UnclosedParenthesis {
                span: (offset, 1).into(),
            });
        }

        Ok(std::mem::take(&mut self.stack))
    }

    fn parse_atom(&mut self, offset: usize) -> Result<()> {
        let token = self.accumulate_while(offset, |c| {
            !(c.is_whitespace() || matches!(c, '(' | ')' | '\'' | ';'))
        });

        let value = if is_integer(token) {
            let number = token
                .parse::<i32>()
                .map_err(|_| ReadError::NumberOutOfRange {
                    literal: token.to_string(),
                    span: (offset, token.len()).into(),
                })?;
            Value::make_number(number)
        } else if token == "nil" {
            Value::nil()
        } else {
            self.symbol(token, offset)?
        };

        self.stack.push(value);
        Ok(())
    }
}

/// An optional minus sign followed by at least one decimal digit.
fn is_integer(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

/// Reads every top level expression of `input`.
pub fn read(machine: &mut Machine, input: &str) -> Result<Vec<Value>> {
    let mut state = State::new(machine, input);
    state.read()
}
