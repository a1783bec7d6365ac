//! Shell Options
//!
//! The option set behind `set -e`, `set -o pipefail`, `shopt -s extglob`
//! and friends. All options are booleans except `parser_mode`, which names
//! the active parser implementation.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct ShellOptions {
    // set -<letter> options
    pub errexit: bool,     // -e
    pub nounset: bool,     // -u
    pub xtrace: bool,      // -x
    pub noglob: bool,      // -f
    pub noclobber: bool,   // -C
    pub noexec: bool,      // -n
    pub verbose: bool,     // -v
    pub allexport: bool,   // -a
    pub monitor: bool,     // -m
    pub notify: bool,      // -b
    pub hashall: bool,     // -h
    pub keyword: bool,     // -k
    pub onecmd: bool,      // -t
    pub physical: bool,    // -P
    pub privileged: bool,  // -p
    pub braceexpand: bool, // -B
    pub errtrace: bool,    // -E
    pub functrace: bool,   // -T
    pub histexpand: bool,  // -H

    // set -o only
    pub pipefail: bool,
    pub posix: bool,
    pub ignoreeof: bool,
    pub emacs: bool,
    pub vi: bool,
    pub history: bool,
    pub interactive_comments: bool,

    // shopt-style globbing and matching options
    pub extglob: bool,
    pub nullglob: bool,
    pub dotglob: bool,
    pub globstar: bool,
    pub failglob: bool,
    pub nocaseglob: bool,
    pub nocasematch: bool,
    pub expand_aliases: bool,
    pub lastpipe: bool,

    /// Active parser implementation (only `recursive-descent` ships)
    pub parser_mode: String,
}

impl Default for ShellOptions {
    fn default() -> Self {
        ShellOptions {
            errexit: false,
            nounset: false,
            xtrace: false,
            noglob: false,
            noclobber: false,
            noexec: false,
            verbose: false,
            allexport: false,
            monitor: false,
            notify: false,
            hashall: true,
            keyword: false,
            onecmd: false,
            physical: false,
            privileged: false,
            braceexpand: true,
            errtrace: false,
            functrace: false,
            histexpand: false,
            pipefail: false,
            posix: false,
            ignoreeof: false,
            emacs: false,
            vi: false,
            history: false,
            interactive_comments: true,
            extglob: false,
            nullglob: false,
            dotglob: false,
            globstar: false,
            failglob: false,
            nocaseglob: false,
            nocasematch: false,
            expand_aliases: true,
            lastpipe: false,
            parser_mode: "recursive-descent".to_string(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OptionError {
    #[error("psh: set: {0}: invalid option name")]
    UnknownName(String),
    #[error("psh: set: -{0}: invalid option")]
    UnknownLetter(char),
}

impl ShellOptions {
    /// `set -o name` / `set +o name`, plus shopt-style names.
    pub fn set_by_name(&mut self, name: &str, value: bool) -> Result<(), OptionError> {
        match name {
            "errexit" => self.errexit = value,
            "nounset" => self.nounset = value,
            "xtrace" => self.xtrace = value,
            "noglob" => self.noglob = value,
            "noclobber" => self.noclobber = value,
            "noexec" => self.noexec = value,
            "verbose" => self.verbose = value,
            "allexport" => self.allexport = value,
            "monitor" => self.monitor = value,
            "notify" => self.notify = value,
            "hashall" => self.hashall = value,
            "keyword" => self.keyword = value,
            "onecmd" => self.onecmd = value,
            "physical" => self.physical = value,
            "privileged" => self.privileged = value,
            "braceexpand" => self.braceexpand = value,
            "errtrace" => self.errtrace = value,
            "functrace" => self.functrace = value,
            "histexpand" => self.histexpand = value,
            "pipefail" => self.pipefail = value,
            "posix" => self.posix = value,
            "ignoreeof" => self.ignoreeof = value,
            "emacs" => self.emacs = value,
            "vi" => self.vi = value,
            "history" => self.history = value,
            "interactive-comments" => self.interactive_comments = value,
            "extglob" => self.extglob = value,
            "nullglob" => self.nullglob = value,
            "dotglob" => self.dotglob = value,
            "globstar" => self.globstar = value,
            "failglob" => self.failglob = value,
            "nocaseglob" => self.nocaseglob = value,
            "nocasematch" => self.nocasematch = value,
            "expand_aliases" => self.expand_aliases = value,
            "lastpipe" => self.lastpipe = value,
            _ => return Err(OptionError::UnknownName(name.to_string())),
        }
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Option<bool> {
        Some(match name {
            "errexit" => self.errexit,
            "nounset" => self.nounset,
            "xtrace" => self.xtrace,
            "noglob" => self.noglob,
            "noclobber" => self.noclobber,
            "noexec" => self.noexec,
            "verbose" => self.verbose,
            "allexport" => self.allexport,
            "monitor" => self.monitor,
            "notify" => self.notify,
            "hashall" => self.hashall,
            "keyword" => self.keyword,
            "onecmd" => self.onecmd,
            "physical" => self.physical,
            "privileged" => self.privileged,
            "braceexpand" => self.braceexpand,
            "errtrace" => self.errtrace,
            "functrace" => self.functrace,
            "histexpand" => self.histexpand,
            "pipefail" => self.pipefail,
            "posix" => self.posix,
            "ignoreeof" => self.ignoreeof,
            "emacs" => self.emacs,
            "vi" => self.vi,
            "history" => self.history,
            "interactive-comments" => self.interactive_comments,
            "extglob" => self.extglob,
            "nullglob" => self.nullglob,
            "dotglob" => self.dotglob,
            "globstar" => self.globstar,
            "failglob" => self.failglob,
            "nocaseglob" => self.nocaseglob,
            "nocasematch" => self.nocasematch,
            "expand_aliases" => self.expand_aliases,
            "lastpipe" => self.lastpipe,
            _ => return None,
        })
    }

    /// `set -e` style single letters.
    pub fn set_by_letter(&mut self, letter: char, value: bool) -> Result<(), OptionError> {
        let name = Self::letter_name(letter).ok_or(OptionError::UnknownLetter(letter))?;
        self.set_by_name(name, value)
    }

    fn letter_name(letter: char) -> Option<&'static str> {
        Some(match letter {
            'e' => "errexit",
            'u' => "nounset",
            'x' => "xtrace",
            'f' => "noglob",
            'C' => "noclobber",
            'n' => "noexec",
            'v' => "verbose",
            'a' => "allexport",
            'm' => "monitor",
            'b' => "notify",
            'h' => "hashall",
            'k' => "keyword",
            't' => "onecmd",
            'P' => "physical",
            'p' => "privileged",
            'B' => "braceexpand",
            'E' => "errtrace",
            'T' => "functrace",
            'H' => "histexpand",
            _ => return None,
        })
    }

    /// The `$-` string: one letter per enabled short option.
    pub fn flag_string(&self, interactive: bool) -> String {
        let mut out = String::new();
        for (letter, on) in [
            ('a', self.allexport),
            ('B', self.braceexpand),
            ('b', self.notify),
            ('C', self.noclobber),
            ('e', self.errexit),
            ('E', self.errtrace),
            ('f', self.noglob),
            ('H', self.histexpand),
            ('h', self.hashall),
            ('k', self.keyword),
            ('m', self.monitor),
            ('n', self.noexec),
            ('P', self.physical),
            ('p', self.privileged),
            ('T', self.functrace),
            ('t', self.onecmd),
            ('u', self.nounset),
            ('v', self.verbose),
            ('x', self.xtrace),
        ] {
            if on {
                out.push(letter);
            }
        }
        if interactive {
            out.push('i');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_by_name_round_trips() {
        let mut o = ShellOptions::default();
        o.set_by_name("pipefail", true).unwrap();
        assert_eq!(o.get_by_name("pipefail"), Some(true));
        o.set_by_name("pipefail", false).unwrap();
        assert_eq!(o.get_by_name("pipefail"), Some(false));
    }

    #[test]
    fn unknown_name_rejected() {
        let mut o = ShellOptions::default();
        assert!(o.set_by_name("bogus", true).is_err());
        assert_eq!(o.get_by_name("bogus"), None);
    }

    #[test]
    fn letters_map_to_names() {
        let mut o = ShellOptions::default();
        o.set_by_letter('e', true).unwrap();
        assert!(o.errexit);
        o.set_by_letter('C', true).unwrap();
        assert!(o.noclobber);
        assert!(o.set_by_letter('Z', true).is_err());
    }

    #[test]
    fn flag_string_reflects_options() {
        let mut o = ShellOptions::default();
        o.errexit = true;
        o.nounset = true;
        let s = o.flag_string(false);
        assert!(s.contains('e'));
        assert!(s.contains('u'));
        assert!(!s.contains('i'));
        assert!(o.flag_string(true).contains('i'));
    }
}
