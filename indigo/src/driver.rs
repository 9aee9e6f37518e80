//! Top-level orchestration: file inclusion, namespace nesting, the
//! print directive, and the final validation pass.
//!
//! A directory is included by recursing into its `main.ind` one depth
//! deeper (mirroring the original interpreter's `chdir`-based traversal);
//! unlike that original, the "current directory" is threaded explicitly as
//! `base_dir` rather than mutated process-globally, so parsing never leaves
//! a stray `chdir` outstanding on an error path.

use std::fs;
use std::path::{Path, PathBuf};

use codespan_reporting::files::SimpleFiles;

use crate::core::printer::pretty_expression;
use crate::core::Module;
use crate::elaborator::{self, Scope};
use crate::lexer::{Lexer, Token};
use crate::reporting::{Message, MessageKind};

const MAIN_FILE_NAME: &str = "main.ind";

/// A completed or failed run: the accumulated file table (for rendering any
/// diagnostic against), and either the finished module plus whatever the
/// program printed, or the single message that aborted it.
pub enum Outcome {
    Success { files: SimpleFiles<String, String>, module: Module, output: String },
    Failure { files: SimpleFiles<String, String>, message: Message },
}

/// The line width [`pretty_expression`] wraps print-directive output against
/// when the caller has no better figure (e.g. the test suite, or a
/// non-terminal stdout).
pub const DEFAULT_WIDTH: usize = 80;

/// Parse and elaborate the file at `base_dir.join(entry)`, then validate the
/// resulting module, wrapping printed output at [`DEFAULT_WIDTH`].
pub fn run_file(base_dir: &Path, entry: &Path) -> Outcome {
    run_file_with_width(base_dir, entry, DEFAULT_WIDTH)
}

/// As [`run_file`], wrapping printed output at `width` columns instead —
/// `indigo-cli` passes the detected terminal width here.
pub fn run_file_with_width(base_dir: &Path, entry: &Path, width: usize) -> Outcome {
    let mut driver = Driver { files: SimpleFiles::new(), module: Module::new(), output: String::new(), width };
    let result = driver.parse_path(base_dir, entry, 0).and_then(|()| {
        driver.module.validate(0).map_err(|e| Message::from_store_error(0, 0..0, e))
    });
    match result {
        Ok(()) => {
            log::info!("validation succeeded");
            Outcome::Success { files: driver.files, module: driver.module, output: driver.output }
        }
        Err(message) => Outcome::Failure { files: driver.files, message },
    }
}

/// Parse and elaborate `source` as a single, self-contained program (no
/// `base_dir` to resolve includes against other than the process's own
/// current directory), then validate. Used by the integration tests, which
/// embed whole programs as string literals.
pub fn run_source(name: &str, source: &str) -> Outcome {
    let mut driver =
        Driver { files: SimpleFiles::new(), module: Module::new(), output: String::new(), width: DEFAULT_WIDTH };
    let result = driver
        .parse_source(name.to_owned(), source.to_owned(), Path::new("."), 0)
        .and_then(|()| driver.module.validate(0).map_err(|e| Message::from_store_error(0, 0..0, e)));
    match result {
        Ok(()) => Outcome::Success { files: driver.files, module: driver.module, output: driver.output },
        Err(message) => Outcome::Failure { files: driver.files, message },
    }
}

struct Driver {
    files: SimpleFiles<String, String>,
    module: Module,
    output: String,
    width: usize,
}

impl Driver {
    fn parse_path(&mut self, base_dir: &Path, rel_path: &Path, depth: usize) -> Result<(), Message> {
        let full_path = base_dir.join(rel_path);
        let metadata = fs::metadata(&full_path).map_err(|error| io_error(&full_path, error))?;

        if metadata.is_dir() {
            log::debug!("entering directory include {}", full_path.display());
            let result = self.parse_path(&full_path, Path::new(MAIN_FILE_NAME), depth + 1);
            log::debug!("leaving directory include {}", full_path.display());
            result
        } else {
            log::debug!("entering file {}", full_path.display());
            let source = fs::read_to_string(&full_path).map_err(|error| io_error(&full_path, error))?;
            let parent = full_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
            let result = self.parse_source(full_path.display().to_string(), source, &parent, depth);
            log::debug!("leaving file {}", full_path.display());
            result
        }
    }

    fn parse_source(&mut self, name: String, source: String, base_dir: &Path, depth: usize) -> Result<(), Message> {
        let file_id = self.files.add(name, source);
        let source = self.files.get(file_id).expect("just inserted").source().clone();
        let mut lexer = Lexer::new(&source);

        while lexer.peek().map_err(|e| Message::lex(file_id, e))?.is_some() {
            self.parse_statement(&mut lexer, file_id, base_dir, depth)?;
        }
        Ok(())
    }

    /// One top-level statement: a file include, a namespace block, the
    /// print directive, or a declaration. End-of-line comments are
    /// already consumed by the lexer as skipped tokens, so they need no
    /// handling here.
    fn parse_statement(
        &mut self,
        lexer: &mut Lexer,
        file_id: usize,
        base_dir: &Path,
        depth: usize,
    ) -> Result<(), Message> {
        match lexer.peek().map_err(|e| Message::lex(file_id, e))?.cloned() {
            Some(Token::LAngle) => {
                log::debug!("statement: include");
                self.parse_include(lexer, file_id, base_dir, depth)
            }
            Some(Token::At) => {
                log::debug!("statement: namespace");
                self.parse_namespace(lexer, file_id, base_dir, depth)
            }
            Some(Token::Dollar) => {
                log::debug!("statement: print");
                self.parse_print(lexer, file_id)
            }
            Some(_) => {
                log::debug!("statement: declaration");
                elaborator::parse_declaration(lexer, file_id, &mut self.module, depth)
            }
            None => Err(Message {
                file: file_id,
                kind: MessageKind::UnexpectedEof { expected: "a statement" },
            }),
        }
    }

    fn parse_include(
        &mut self,
        lexer: &mut Lexer,
        file_id: usize,
        base_dir: &Path,
        depth: usize,
    ) -> Result<(), Message> {
        lexer.advance().map_err(|e| Message::lex(file_id, e))?; // `<`
        let (raw_path, range) = lexer.scan_raw_until('>');
        match lexer.advance().map_err(|e| Message::lex(file_id, e))? {
            Some((Token::RAngle, _)) => {}
            Some((found, range)) => {
                return Err(Message {
                    file: file_id,
                    kind: MessageKind::UnexpectedToken { range, found: found.to_string(), expected: "`>`" },
                })
            }
            None => return Err(Message { file: file_id, kind: MessageKind::UnexpectedEof { expected: "`>`" } }),
        }
        let _ = range;
        self.parse_path(base_dir, Path::new(&raw_path), depth)
    }

    fn parse_namespace(
        &mut self,
        lexer: &mut Lexer,
        file_id: usize,
        base_dir: &Path,
        depth: usize,
    ) -> Result<(), Message> {
        lexer.advance().map_err(|e| Message::lex(file_id, e))?; // `@`
        let (name, _) = elaborator::parse_name_public(lexer, file_id)?;
        expect_public(lexer, file_id, Token::LBrace, "`{`")?;

        while !matches!(lexer.peek().map_err(|e| Message::lex(file_id, e))?, Some(Token::RBrace) | None) {
            self.parse_statement(lexer, file_id, base_dir, depth + 1)?;
        }
        self.module.close_namespace(depth + 1, &name);
        expect_public(lexer, file_id, Token::RBrace, "`}`")?;
        Ok(())
    }

    fn parse_print(&mut self, lexer: &mut Lexer, file_id: usize) -> Result<(), Message> {
        let scope = Scope::default();
        let range = lexer.peek_range().map_err(|e| Message::lex(file_id, e))?;
        lexer.advance().map_err(|e| Message::lex(file_id, e))?; // `$`
        let r#type = elaborator::parse_type(lexer, file_id, &self.module, &scope)?;
        expect_public(lexer, file_id, Token::LBracket, "`[`")?;
        let value = elaborator::parse_expression(lexer, file_id, &self.module, &scope, &r#type)?;
        let caller = elaborator::parse_destructor_chain_public(lexer, file_id, &self.module, &scope, r#type, value)?;
        expect_public(lexer, file_id, Token::RBracket, "`]`")?;
        expect_public(lexer, file_id, Token::Semicolon, "`;`")?;

        let alloc = pretty::BoxAllocator;
        let doc = pretty_expression(&alloc, &self.module, &scope.parameters, &caller.r#type, &caller.value)
            .map_err(|e| elaborator::unspecified_rule_message_public(&self.module, file_id, range, e))?;
        let rendered = doc.1.pretty(self.width).to_string();
        log::debug!("print directive produced {} bytes of output", rendered.len());
        self.output.push_str(&rendered);
        self.output.push('\n');
        Ok(())
    }
}

fn expect_public(lexer: &mut Lexer, file_id: usize, token: Token, what: &'static str) -> Result<(), Message> {
    elaborator::expect_public(lexer, file_id, token, what)
}

fn io_error(path: &Path, error: std::io::Error) -> Message {
    Message { file: 0, kind: MessageKind::Io { path: path.display().to_string(), error: error.to_string() } }
}
