//! Typed command lines.
//!
//! Commands are kept as an ordered list of words and flags instead of a
//! string, so removing or rewriting a flag is a list operation.

use backup_harness_ports::shell_quote;
use std::fmt;

/// How a flag's value is attached to its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagStyle {
    /// `--flag value`
    Space,
    /// `--flag=value`
    Equals,
    /// `-Pvalue`
    Attached,
}

/// One flag, with or without a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag {
    /// Flag token including its dashes (`--namespace`, `-U`).
    pub name: String,
    /// Value; `None` for switches.
    pub value: Option<String>,
    /// Rendering of the value.
    pub style: FlagStyle,
}

impl Flag {
    /// `--name value`.
    pub fn space(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: flag_token(name),
            value: Some(value.into()),
            style: FlagStyle::Space,
        }
    }

    /// `--name=value`.
    pub fn equals(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: flag_token(name),
            value: Some(value.into()),
            style: FlagStyle::Equals,
        }
    }

    /// `-Nvalue`.
    pub fn attached(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: flag_token(name),
            value: Some(value.into()),
            style: FlagStyle::Attached,
        }
    }

    /// Valueless `--name`.
    pub fn switch(name: &str) -> Self {
        Self {
            name: flag_token(name),
            value: None,
            style: FlagStyle::Space,
        }
    }

    /// True when this flag answers to `name` (`namespace` or `--namespace`).
    pub fn is(&self, name: &str) -> bool {
        self.name == flag_token(name)
    }

    fn push_tokens(&self, out: &mut Vec<String>) {
        match (&self.value, self.style) {
            (None, _) => out.push(self.name.clone()),
            (Some(value), FlagStyle::Space) => {
                out.push(self.name.clone());
                out.push(value.clone());
            },
            (Some(value), FlagStyle::Equals) => out.push(format!("{}={value}", self.name)),
            (Some(value), FlagStyle::Attached) => out.push(format!("{}{value}", self.name)),
        }
    }
}

/// Token of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Positional word (subcommand, file name).
    Word(String),
    /// Flag.
    Flag(Flag),
}

/// Program plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<Arg>,
}

/// `namespace` -> `--namespace`; names that already carry dashes are kept.
pub fn flag_token(name: &str) -> String {
    if name.starts_with('-') {
        name.to_string()
    } else {
        format!("--{name}")
    }
}

impl CommandLine {
    /// Empty command for `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Parse a whitespace separated command line.
    ///
    /// `--a=b` becomes an [`FlagStyle::Equals`] flag, `--a b` a
    /// [`FlagStyle::Space`] flag unless `b` itself starts with `--`, and a
    /// bare `--a` a switch. Returns `None` for blank input.
    pub fn parse(text: &str) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        let program = tokens.next()?;
        let mut command = Self::new(program);
        command.extend_tokens(tokens);
        Some(command)
    }

    /// Program token.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in order.
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Flags in order.
    pub fn flags(&self) -> impl Iterator<Item = &Flag> {
        self.args.iter().filter_map(|arg| match arg {
            Arg::Flag(flag) => Some(flag),
            Arg::Word(_) => None,
        })
    }

    /// Append a positional word.
    pub fn push_word(&mut self, word: impl Into<String>) -> &mut Self {
        self.args.push(Arg::Word(word.into()));
        self
    }

    /// Append a flag.
    pub fn push_flag(&mut self, flag: Flag) -> &mut Self {
        self.args.push(Arg::Flag(flag));
        self
    }

    /// Append `--name value`.
    pub fn push(&mut self, name: &str, value: impl fmt::Display) -> &mut Self {
        self.push_flag(Flag::space(name, value.to_string()))
    }

    /// Append `--name`.
    pub fn push_switch(&mut self, name: &str) -> &mut Self {
        self.push_flag(Flag::switch(name))
    }

    /// Append tokens using the same rules as [`CommandLine::parse`].
    pub fn extend_tokens<'a>(&mut self, tokens: impl IntoIterator<Item = &'a str>) -> &mut Self {
        let mut tokens = tokens.into_iter().peekable();
        while let Some(token) = tokens.next() {
            if !token.starts_with('-') || token.len() < 2 {
                self.push_word(token);
                continue;
            }
            if let Some((name, value)) = token.split_once('=') {
                self.push_flag(Flag::equals(name, value));
                continue;
            }
            match tokens.next_if(|next| !next.starts_with("--")) {
                Some(value) => self.push_flag(Flag::space(token, value)),
                None => self.push_flag(Flag::switch(token)),
            };
        }
        self
    }

    /// Remove every occurrence of `name` together with its value.
    pub fn remove_flag(&mut self, name: &str) -> &mut Self {
        let token = flag_token(name);
        self.args
            .retain(|arg| !matches!(arg, Arg::Flag(flag) if flag.name == token));
        self
    }

    /// Remove `name`, then append `--name value`.
    pub fn replace_flag(&mut self, name: &str, value: impl fmt::Display) -> &mut Self {
        self.remove_flag(name).push(name, value)
    }

    /// Rewrite each occurrence of `name` in place.
    pub fn rewrite_flag(&mut self, name: &str, mut rewrite: impl FnMut(&Flag) -> Flag) -> &mut Self {
        for arg in &mut self.args {
            if let Arg::Flag(flag) = arg
                && flag.is(name)
            {
                *flag = rewrite(flag);
            }
        }
        self
    }

    /// Drop every argument, keeping the program.
    pub fn clear_args(&mut self) -> &mut Self {
        self.args.clear();
        self
    }

    /// True when `name` is present.
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags().any(|flag| flag.is(name))
    }

    /// Value of the last occurrence of `name` that carries one.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        let token = flag_token(name);
        self.args.iter().rev().find_map(|arg| match arg {
            Arg::Flag(flag) if flag.name == token => flag.value.as_deref(),
            _ => None,
        })
    }

    /// Tokens including the program.
    pub fn to_argv(&self) -> Vec<String> {
        let mut out = vec![self.program.clone()];
        for arg in &self.args {
            match arg {
                Arg::Word(word) => out.push(word.clone()),
                Arg::Flag(flag) => flag.push_tokens(&mut out),
            }
        }
        out
    }

    /// Shell-quoted single line.
    pub fn to_shell(&self) -> String {
        self.to_argv()
            .iter()
            .map(|token| shell_quote(token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_shell())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> CommandLine {
        let mut command = CommandLine::new("./asbackup");
        command
            .push("namespace", "test")
            .push_flag(Flag::equals("tls-cafile", "/ca.pem"))
            .push_switch("remove-files")
            .push("directory", "/tmp/dir");
        command
    }

    #[test]
    fn renders_every_style() {
        let mut command = sample();
        command.push_flag(Flag::attached("-P", "psw"));
        assert_eq!(
            command.to_argv(),
            vec![
                "./asbackup",
                "--namespace",
                "test",
                "--tls-cafile=/ca.pem",
                "--remove-files",
                "--directory",
                "/tmp/dir",
                "-Ppsw",
            ]
        );
    }

    #[test]
    fn remove_flag_handles_both_styles_and_switches() {
        let mut command = sample();
        command.push("namespace", "other");
        command.remove_flag("namespace").remove_flag("--tls-cafile");
        command.remove_flag("remove-files");
        assert_eq!(command.to_shell(), "./asbackup --directory /tmp/dir");
    }

    #[test]
    fn parse_never_takes_a_flag_as_value() {
        let command = CommandLine::parse("./asrestore --unique --namespace ns --tls-name=x xdr");
        let command = command.unwrap_or_else(|| CommandLine::new("missing"));
        assert_eq!(command.value_of("namespace"), Some("ns"));
        assert_eq!(command.value_of("tls-name"), Some("x"));
        assert!(command.has_flag("unique"));
        assert_eq!(
            command.flags().find(|flag| flag.is("unique")).and_then(|flag| flag.value.clone()),
            None
        );
        assert_eq!(command.args().last(), Some(&Arg::Word("xdr".to_string())));
        assert!(CommandLine::parse("   ").is_none());
    }

    #[test]
    fn replace_and_rewrite_keep_position_rules() {
        let mut command = sample();
        command.replace_flag("namespace", "prod");
        assert_eq!(command.value_of("namespace"), Some("prod"));
        assert_eq!(command.flags().filter(|flag| flag.is("namespace")).count(), 1);

        command.rewrite_flag("directory", |flag| {
            Flag::space("output-file", format!("{}/a.asb", flag.value.as_deref().unwrap_or("")))
        });
        assert_eq!(command.value_of("output-file"), Some("/tmp/dir/a.asb"));
        assert!(!command.has_flag("directory"));
    }

    #[test]
    fn shell_rendering_quotes_special_values() {
        let mut command = CommandLine::new("./asbackup");
        command.push("filter-exp", "a b");
        assert_eq!(command.to_string(), "./asbackup --filter-exp 'a b'");
    }

    fn flag_name() -> impl Strategy<Value = String> {
        "[a-z]{1,6}(-[a-z]{1,4})?"
    }

    proptest! {
        #[test]
        fn removed_flag_leaves_no_token(
            target in flag_name(),
            others in proptest::collection::vec((flag_name(), "[a-z0-9/]{0,6}", 0u8..3), 0..8),
            value in "[a-z0-9]{1,6}",
        ) {
            let mut command = CommandLine::new("tool");
            command.push(&target, &value).push_flag(Flag::equals(&target, &value));
            for (name, value, style) in &others {
                match style {
                    0 => command.push(name, value),
                    1 => command.push_flag(Flag::equals(name, value.clone())),
                    _ => command.push_switch(name),
                };
            }
            command.push_switch(&target);
            command.remove_flag(&target);

            let token = flag_token(&target);
            let equals_prefix = format!("{token}=");
            let kept = others.iter().filter(|(name, _, _)| *name != target).count();
            prop_assert_eq!(command.flags().count(), kept);
            for rendered in command.to_argv() {
                prop_assert!(rendered != token);
                prop_assert!(!rendered.starts_with(&equals_prefix));
            }
        }

        #[test]
        fn parsed_values_never_start_with_double_dash(
            words in proptest::collection::vec("(--)?[a-z]{1,5}", 0..10),
        ) {
            let text = format!("tool {}", words.join(" "));
            let command = CommandLine::parse(&text);
            prop_assert!(command.is_some());
            if let Some(command) = command {
                for flag in command.flags() {
                    if let Some(value) = &flag.value {
                        prop_assert!(!value.starts_with("--"));
                    }
                }
            }
        }
    }
}
