mod template;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::artifact::{Artifact, Role};
use crate::error::CommandError;

pub use template::TemplateValues;

/// One element of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Arg(String),
    Artifact(Artifact),
}

impl Token {
    fn render(&self) -> String {
        match self {
            Token::Arg(s) => s.clone(),
            Token::Artifact(a) => a.path().to_string_lossy().into_owned(),
        }
    }
}

/// An external tool invocation: the executable followed by its arguments,
/// some of which are file artifacts.
///
/// Two commands are equal when their argv token sequences are equal.
#[derive(Debug, Clone)]
pub struct Command {
    tokens: Vec<Token>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            tokens: vec![Token::Arg(program.into())],
        }
    }

    /// Builds a command from a template such as
    /// `"mincresample {src!i} -like {like} {dst!o}"`.
    ///
    /// `{name}` and `{0}` substitute values as plain text; `!o` and `!i` turn a
    /// placeholder that spans a whole argument into an output or input artifact.
    pub fn from_template(template: &str, values: &TemplateValues) -> Result<Self, CommandError> {
        let tokens = template::expand(template, values)?;
        Self::from_tokens(tokens)
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Result<Self, CommandError> {
        if tokens.is_empty() {
            return Err(CommandError::Empty);
        }
        Ok(Self { tokens })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.tokens.push(Token::Arg(arg.into()));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens
            .extend(args.into_iter().map(|a| Token::Arg(a.into())));
        self
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.tokens
            .push(Token::Artifact(Artifact::new(path, Role::Input)));
        self
    }

    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.tokens
            .push(Token::Artifact(Artifact::new(path, Role::Output)));
        self
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Executable name or path.
    pub fn program(&self) -> String {
        self.tokens[0].render()
    }

    /// argv as handed to the operating system, program first.
    pub fn argv(&self) -> Vec<String> {
        self.tokens.iter().map(Token::render).collect()
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Artifact> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Artifact(a) if a.is_output() => Some(a),
            _ => None,
        })
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Artifact> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Artifact(a) if !a.is_output() => Some(a),
            _ => None,
        })
    }

    /// True when the command declares at least one output and every output
    /// already exists as a regular file. Commands without outputs can never
    /// prove completion and are never satisfied.
    pub fn is_satisfied(&self) -> bool {
        let mut outputs = self.outputs().peekable();
        outputs.peek().is_some() && outputs.all(Artifact::exists)
    }

    /// Space-joined argv, for display and logs. Not a faithful key: use
    /// [`Command::argv`] to tell commands apart.
    pub fn render(&self) -> String {
        self.argv().join(" ")
    }

    /// Rendering safe to paste into a POSIX shell.
    pub fn shell_line(&self) -> String {
        self.tokens
            .iter()
            .map(|t| shell_quote(&t.render()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.argv() == other.argv()
    }
}

impl Eq for Command {}

impl Hash for Command {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.argv().hash(state);
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_tracks_outputs_separately() {
        let cmd = Command::new("mincresample")
            .input("/in/atlas.mnc")
            .arg("-like")
            .input("/in/subject.mnc")
            .output("/out/resampled.mnc");

        assert_eq!(cmd.program(), "mincresample");
        assert_eq!(cmd.outputs().count(), 1);
        assert_eq!(cmd.inputs().count(), 2);
        assert_eq!(
            cmd.render(),
            "mincresample /in/atlas.mnc -like /in/subject.mnc /out/resampled.mnc"
        );
    }

    #[test]
    fn command_without_outputs_is_never_satisfied() {
        let cmd = Command::new("true");
        assert!(!cmd.is_satisfied());
    }

    #[test]
    fn satisfied_requires_every_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.xfm");
        let b = dir.path().join("b.mnc");
        std::fs::write(&a, b"").unwrap();

        let cmd = Command::new("bestlinreg").output(&a).output(&b);
        assert!(!cmd.is_satisfied());

        std::fs::write(&b, b"").unwrap();
        assert!(cmd.is_satisfied());
    }

    #[test]
    fn shell_line_quotes_unsafe_tokens() {
        let cmd = Command::new("echo").arg("hello world").arg("it's").arg("plain-1.0");
        assert_eq!(cmd.shell_line(), "echo 'hello world' 'it'\"'\"'s' plain-1.0");
    }

    #[test]
    fn equal_renderings_compare_equal() {
        let a = Command::new("nu_correct").input("/in/a.mnc").output("/out/a.mnc");
        let b = Command::new("nu_correct").input("/in/a.mnc").output("/out/a.mnc");
        assert_eq!(a.render(), b.render());
        assert_eq!(a, b);
    }

    #[test]
    fn argument_boundaries_matter() {
        let joined = Command::new("echo").arg("a b");
        let split = Command::new("echo").arg("a").arg("b");
        assert_eq!(joined.render(), split.render());
        assert_ne!(joined, split);
        assert_eq!(split.argv(), vec!["echo", "a", "b"]);
    }
}
