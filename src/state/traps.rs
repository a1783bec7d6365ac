//! Trap Table
//!
//! Maps signal names to handler command strings. The three pseudo-signals
//! `EXIT`, `DEBUG` and `ERR` never install OS handlers; the executor invokes
//! them at the appropriate points.

use std::collections::HashMap;

pub const PSEUDO_SIGNALS: &[&str] = &["EXIT", "DEBUG", "ERR"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrapTable {
    handlers: HashMap<String, String>,
}

impl TrapTable {
    pub fn new() -> Self {
        TrapTable::default()
    }

    /// Canonicalise `SIGINT`, `int`, `2` to `INT` (and pseudo-signal names
    /// to their upper-case forms). Returns None for unknown specs.
    pub fn canonical_name(spec: &str) -> Option<String> {
        let upper = spec.to_uppercase();
        let upper = upper.strip_prefix("SIG").unwrap_or(&upper).to_string();
        if PSEUDO_SIGNALS.contains(&upper.as_str()) {
            return Some(upper);
        }
        if let Ok(n) = upper.parse::<i32>() {
            return signal_name_from_number(n).map(|s| s.to_string());
        }
        if signal_number_from_name(&upper).is_some() {
            return Some(upper);
        }
        None
    }

    pub fn set(&mut self, name: &str, command: impl Into<String>) {
        self.handlers.insert(name.to_string(), command.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.handlers.get(name).map(|s| s.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.handlers.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.handlers.iter()
    }

    /// Signal names (not pseudo-signals) that currently have handlers.
    pub fn trapped_signals(&self) -> Vec<(String, i32)> {
        self.handlers
            .keys()
            .filter_map(|name| signal_number_from_name(name).map(|n| (name.clone(), n)))
            .collect()
    }
}

pub fn signal_number_from_name(name: &str) -> Option<i32> {
    Some(match name {
        "HUP" => 1,
        "INT" => 2,
        "QUIT" => 3,
        "ILL" => 4,
        "TRAP" => 5,
        "ABRT" => 6,
        "BUS" => 7,
        "FPE" => 8,
        "KILL" => 9,
        "USR1" => 10,
        "SEGV" => 11,
        "USR2" => 12,
        "PIPE" => 13,
        "ALRM" => 14,
        "TERM" => 15,
        "CHLD" => 17,
        "CONT" => 18,
        "STOP" => 19,
        "TSTP" => 20,
        "TTIN" => 21,
        "TTOU" => 22,
        "WINCH" => 28,
        _ => return None,
    })
}

pub fn signal_name_from_number(n: i32) -> Option<&'static str> {
    Some(match n {
        0 => "EXIT",
        1 => "HUP",
        2 => "INT",
        3 => "QUIT",
        4 => "ILL",
        5 => "TRAP",
        6 => "ABRT",
        7 => "BUS",
        8 => "FPE",
        9 => "KILL",
        10 => "USR1",
        11 => "SEGV",
        12 => "USR2",
        13 => "PIPE",
        14 => "ALRM",
        15 => "TERM",
        17 => "CHLD",
        18 => "CONT",
        19 => "STOP",
        20 => "TSTP",
        21 => "TTIN",
        22 => "TTOU",
        28 => "WINCH",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names() {
        assert_eq!(TrapTable::canonical_name("SIGINT").as_deref(), Some("INT"));
        assert_eq!(TrapTable::canonical_name("int").as_deref(), Some("INT"));
        assert_eq!(TrapTable::canonical_name("2").as_deref(), Some("INT"));
        assert_eq!(TrapTable::canonical_name("EXIT").as_deref(), Some("EXIT"));
        assert_eq!(TrapTable::canonical_name("exit").as_deref(), Some("EXIT"));
        assert_eq!(TrapTable::canonical_name("NOSUCH"), None);
    }

    #[test]
    fn set_get_remove() {
        let mut t = TrapTable::new();
        t.set("EXIT", "echo bye");
        assert_eq!(t.get("EXIT"), Some("echo bye"));
        assert_eq!(t.remove("EXIT").as_deref(), Some("echo bye"));
        assert_eq!(t.get("EXIT"), None);
    }

    #[test]
    fn trapped_signals_excludes_pseudo() {
        let mut t = TrapTable::new();
        t.set("EXIT", "x");
        t.set("INT", "y");
        let trapped = t.trapped_signals();
        assert_eq!(trapped, vec![("INT".to_string(), 2)]);
    }
}
