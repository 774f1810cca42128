//! Setter generators for the command builders.
//!
//! Every builder keeps its arguments in a `command: CommandLine` field; each
//! setter appends one flag and hands the builder back for chaining.

/// `fn name(self, value) -> Self` appending `--flag <value>`.
macro_rules! value_setters {
    ($($name:ident => $flag:literal;)*) => {
        $(
            #[doc = concat!("Append `--", $flag, " <value>`.")]
            #[must_use]
            pub fn $name(mut self, value: impl ToString) -> Self {
                self.command.push($flag, value.to_string());
                self
            }
        )*
    };
}

/// `fn name(self) -> Self` appending the switch `--flag`.
macro_rules! switch_setters {
    ($($name:ident => $flag:literal;)*) => {
        $(
            #[doc = concat!("Append `--", $flag, "`.")]
            #[must_use]
            pub fn $name(mut self) -> Self {
                self.command.push_switch($flag);
                self
            }
        )*
    };
}

/// `fn name(self, items) -> Self` appending `--flag a,b,c`.
macro_rules! list_setters {
    ($($name:ident => $flag:literal;)*) => {
        $(
            #[doc = concat!("Append `--", $flag, " <a,b,...>`.")]
            #[must_use]
            pub fn $name<I, S>(mut self, items: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: AsRef<str>,
            {
                self.command.push($flag, crate::macros::join_csv(items));
                self
            }
        )*
    };
}

pub(crate) use list_setters;
pub(crate) use switch_setters;
pub(crate) use value_setters;

pub(crate) fn join_csv<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| item.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}
