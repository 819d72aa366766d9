//! CAT text helpers.
//!
//! K4 CAT commands are a short prefix followed by ASCII parameters and a
//! `;` terminator:
//!
//! ```text
//! <prefix><params>;
//! ```
//!
//! The prefix is two to five characters drawn from uppercase letters, `$`
//! (sub receiver) and `#` (panadapter display commands). There is no
//! escaping; `;` never appears inside parameters. A single CAT packet from
//! the radio often carries many commands back to back.

/// CAT command terminator.
pub const TERMINATOR: char = ';';

/// Error response from the radio (`?;`).
pub const ERROR_RESPONSE: &str = "?";

/// Encode a CAT command: prefix, parameters, terminator.
///
/// # Example
///
/// ```
/// use k4link_protocol::cat::encode_command;
///
/// assert_eq!(encode_command("FA", "00014250000"), "FA00014250000;");
/// assert_eq!(encode_command("BW$", "0240"), "BW$0240;");
/// assert_eq!(encode_command("RDY", ""), "RDY;");
/// ```
pub fn encode_command(prefix: &str, params: &str) -> String {
    let mut cmd = String::with_capacity(prefix.len() + params.len() + 1);
    cmd.push_str(prefix);
    cmd.push_str(params);
    cmd.push(TERMINATOR);
    cmd
}

/// Split CAT text into individual commands, terminators removed.
///
/// Whitespace around each command is trimmed and empty commands are
/// skipped, so `"FA00014074000;\r\nMD2;;"` yields `FA00014074000` and `MD2`.
pub fn split_commands(text: &str) -> impl Iterator<Item = &str> {
    text.split(TERMINATOR)
        .map(str::trim)
        .filter(|cmd| !cmd.is_empty())
}

/// Strip one trailing terminator (and surrounding whitespace) from a line.
pub fn strip_terminator(line: &str) -> &str {
    let line = line.trim();
    line.strip_suffix(TERMINATOR).unwrap_or(line).trim_end()
}

/// `true` if the command is the radio's `?` error response.
pub fn is_error_response(cmd: &str) -> bool {
    strip_terminator(cmd) == ERROR_RESPONSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_query_and_set() {
        assert_eq!(encode_command("MD", ""), "MD;");
        assert_eq!(encode_command("MD$", "3"), "MD$3;");
        assert_eq!(encode_command("#REF", "-110"), "#REF-110;");
    }

    #[test]
    fn split_state_dump_burst() {
        let burst = "FA00014074000;FB00007030000;MD2;MD$3;\r\n#REF$-105;";
        let cmds: Vec<&str> = split_commands(burst).collect();
        assert_eq!(
            cmds,
            vec!["FA00014074000", "FB00007030000", "MD2", "MD$3", "#REF$-105"]
        );
    }

    #[test]
    fn split_skips_empty_commands() {
        let cmds: Vec<&str> = split_commands(";;TQ0;; ;").collect();
        assert_eq!(cmds, vec!["TQ0"]);
    }

    #[test]
    fn strip_single_terminator() {
        assert_eq!(strip_terminator("BW0050;"), "BW0050");
        assert_eq!(strip_terminator("BW0050"), "BW0050");
        assert_eq!(strip_terminator(" KS025; "), "KS025");
    }

    #[test]
    fn error_response() {
        assert!(is_error_response("?;"));
        assert!(is_error_response("?"));
        assert!(!is_error_response("ID017;"));
    }
}
