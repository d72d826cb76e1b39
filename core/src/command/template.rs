use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use super::Token;
use crate::artifact::{Artifact, Role};
use crate::error::CommandError;

/// Values substituted into a command template.
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    positional: Vec<String>,
    named: HashMap<String, String>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.positional.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn with_named(mut self, named: HashMap<String, String>) -> Self {
        self.named.extend(named);
        self
    }

    fn lookup(&self, key: &str, auto_index: &mut usize) -> Option<&str> {
        if key.is_empty() {
            let idx = *auto_index;
            *auto_index += 1;
            return self.positional.get(idx).map(String::as_str);
        }
        if let Ok(idx) = key.parse::<usize>() {
            return self.positional.get(idx).map(String::as_str);
        }
        self.named.get(key).map(String::as_str)
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{([A-Za-z0-9_]*)(?:!([A-Za-z]+))?\}").expect("placeholder regex is valid")
    })
}

pub(super) fn expand(template: &str, values: &TemplateValues) -> Result<Vec<Token>, CommandError> {
    let re = placeholder_re();
    let mut auto_index = 0usize;
    let mut tokens = Vec::new();

    for word in split_words(template)? {
        let mut role = None;
        let mut whole = false;
        let mut failure = None;

        let expanded = re.replace_all(&word, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            let placeholder = caps[0].to_string();
            if let Some(marker) = caps.get(2) {
                match marker.as_str() {
                    "o" => role = Some(Role::Output),
                    "i" => role = Some(Role::Input),
                    other => {
                        failure.get_or_insert(CommandError::UnknownMarker {
                            placeholder: placeholder.clone(),
                            marker: other.to_string(),
                        });
                    }
                }
                whole = placeholder.len() == word.len();
            }
            match values.lookup(key, &mut auto_index) {
                Some(v) => v.to_string(),
                None => {
                    failure.get_or_insert(CommandError::UnknownPlaceholder(placeholder));
                    String::new()
                }
            }
        });
        let expanded = expanded.into_owned();

        if let Some(err) = failure {
            return Err(err);
        }

        match role {
            Some(_) if !whole => return Err(CommandError::EmbeddedArtifact(word)),
            Some(role) => tokens.push(Token::Artifact(Artifact::new(expanded, role))),
            None => tokens.push(Token::Arg(expanded)),
        }
    }

    if tokens.is_empty() {
        return Err(CommandError::Empty);
    }
    Ok(tokens)
}

/// Splits on whitespace; single and double quotes group words and are removed.
fn split_words(s: &str) -> Result<Vec<String>, CommandError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in s.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(CommandError::UnterminatedQuote(s.to_string()));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    #[test]
    fn marks_outputs_and_inputs() {
        let values = TemplateValues::new()
            .set("src", "/in/subject.mnc")
            .set("xfm", "/out/reg/subject.xfm")
            .set("res", "/out/reg/subject.mnc");
        let cmd = Command::from_template("bestlinreg {src!i} {xfm!o} {res!o} -lsq12", &values)
            .unwrap();

        let outputs: Vec<_> = cmd.outputs().map(|a| a.path().to_path_buf()).collect();
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].ends_with("subject.xfm"));
        assert_eq!(cmd.inputs().count(), 1);
        assert_eq!(
            cmd.render(),
            "bestlinreg /in/subject.mnc /out/reg/subject.xfm /out/reg/subject.mnc -lsq12"
        );
    }

    #[test]
    fn positional_and_auto_numbered() {
        let values = TemplateValues::new().positional(["a", "b"]);
        let cmd = Command::from_template("cp {} {!o}", &values).unwrap();
        assert_eq!(cmd.outputs().count(), 1);

        let cmd = Command::from_template("cp {1} {0}", &values).unwrap();
        assert_eq!(cmd.argv(), vec!["cp", "b", "a"]);
    }

    #[test]
    fn plain_substitution_inside_argument() {
        let values = TemplateValues::new().set("n", "4");
        let cmd = Command::from_template("ants -i {n}x{n} --label 'two words'", &values).unwrap();
        assert_eq!(cmd.argv(), vec!["ants", "-i", "4x4", "--label", "two words"]);
    }

    #[test]
    fn rejects_bad_templates() {
        let values = TemplateValues::new().set("x", "/tmp/x");
        assert!(matches!(
            Command::from_template("tool {missing}", &values),
            Err(CommandError::UnknownPlaceholder(_))
        ));
        assert!(matches!(
            Command::from_template("tool --out={x!o}", &values),
            Err(CommandError::EmbeddedArtifact(_))
        ));
        assert!(matches!(
            Command::from_template("tool {x!z}", &values),
            Err(CommandError::UnknownMarker { .. })
        ));
        assert!(matches!(
            Command::from_template("tool 'open", &values),
            Err(CommandError::UnterminatedQuote(_))
        ));
        assert!(matches!(
            Command::from_template("   ", &values),
            Err(CommandError::Empty)
        ));
    }
}
