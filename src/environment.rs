use crate::error::GtfError;
use crate::validation::validate_allowed;
use std::fmt;
use std::str::FromStr;

/// Deployment environment selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Sandbox,
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Sandbox,
        Environment::Dev,
        Environment::Staging,
        Environment::Prod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Sandbox => "sandbox",
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }

    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Environment::as_str).collect()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = GtfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_allowed("environment", s, &Self::names())?;
        Self::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| GtfError::Usage(format!("unknown environment '{}'", s)))
    }
}

/// Terraform action to run against an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Plan,
    Apply,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Plan => "plan",
            Action::Apply => "apply",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = GtfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_allowed("action", s, &["plan", "apply"])?;
        Ok(if s == "plan" { Action::Plan } else { Action::Apply })
    }
}
