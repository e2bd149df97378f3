use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::str::FromStr;

/// `predicate arg...`; arguments starting with `?` are variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Atom {
    pub predicate: String,
    pub args: Vec<String>,
}

impl Atom {
    pub fn new(predicate: &str, args: &[&str]) -> Self {
        Atom {
            predicate: predicate.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    pub fn is_ground(&self) -> bool {
        !self.args.iter().any(|arg| is_variable(arg))
    }
}

pub fn is_variable(term: &str) -> bool {
    term.starts_with('?')
}

impl FromStr for Atom {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(trimmed);
        let mut tokens = inner.split_whitespace();
        let predicate = tokens
            .next()
            .ok_or_else(|| anyhow!("empty atom {text:?}"))?;
        Ok(Atom {
            predicate: predicate.to_string(),
            args: tokens.map(str::to_string).collect(),
        })
    }
}

impl TryFrom<String> for Atom {
    type Error = anyhow::Error;

    fn try_from(text: String) -> Result<Self> {
        text.parse()
    }
}

impl From<Atom> for String {
    fn from(atom: Atom) -> String {
        atom.to_string()
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.predicate)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSchema {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub precondition: Vec<Atom>,
    #[serde(default)]
    pub add: Vec<Atom>,
    #[serde(default)]
    pub delete: Vec<Atom>,
}

/// A lifted STRIPS planning problem: what the translator grounds into a
/// `Task`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    #[serde(default)]
    pub name: String,
    pub objects: Vec<String>,
    pub actions: Vec<ActionSchema>,
    #[serde(default)]
    pub init: Vec<Atom>,
    pub goal: Vec<Atom>,
}

impl Declaration {
    pub fn from_file(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("cannot open problem {path}"))?;
        let reader = BufReader::new(file);
        let declaration = serde_yaml::from_reader(reader)
            .with_context(|| format!("cannot parse problem {path}"))?;
        Ok(declaration)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn action(&self, name: &str) -> Option<&ActionSchema> {
        self.actions.iter().find(|action| action.name == name)
    }

    /// Copy of this declaration with `extra` appended to its actions.
    pub fn with_actions(&self, extra: impl IntoIterator<Item = ActionSchema>) -> Declaration {
        let mut declaration = self.clone();
        declaration.actions.extend(extra);
        declaration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_atom() {
        let atom: Atom = "(at ?b rooma)".parse().unwrap();
        assert_eq!(atom, Atom::new("at", &["?b", "rooma"]));
        assert!(!atom.is_ground());

        let bare: Atom = "free".parse().unwrap();
        assert_eq!(bare.args.len(), 0);
        assert!(bare.is_ground());

        assert!("()".parse::<Atom>().is_err());
    }

    #[test]
    fn test_load_gripper() {
        let declaration = Declaration::from_file("problems/gripper.yaml").unwrap();
        assert_eq!(declaration.objects.len(), 4);
        assert_eq!(declaration.actions.len(), 3);
        assert_eq!(declaration.goal.len(), 2);

        let pick = declaration.action("pick").unwrap();
        assert_eq!(pick.parameters, vec!["?b", "?r"]);
        assert_eq!(pick.delete.len(), 2);
    }

    #[test]
    fn test_with_actions_appends() {
        let declaration = Declaration::from_file("problems/gripper.yaml").unwrap();
        let extra = ActionSchema {
            name: "wait".to_string(),
            parameters: vec![],
            precondition: vec![],
            add: vec![],
            delete: vec![],
        };
        let extended = declaration.with_actions([extra]);
        assert_eq!(extended.actions.len(), 4);
        assert_eq!(declaration.actions.len(), 3);
        assert!(extended.action("wait").is_some());
    }

    #[test]
    fn test_atoms_round_trip_through_yaml() {
        let text = "objects: [a]\nactions: []\ninit: [\"p a\"]\ngoal: [\"(q a)\"]\n";
        let declaration = Declaration::from_yaml_str(text).unwrap();
        assert_eq!(declaration.init[0], Atom::new("p", &["a"]));
        assert_eq!(declaration.goal[0], Atom::new("q", &["a"]));
    }
}
