//! Terminal noise filter applied to every chunk of captured output.
//!
//! Removes ANSI escape sequences (OSC, CSI and two-byte `ESC x` forms) and
//! the braille spinner glyphs the supervised tool draws while busy.
//! Ordinary printable text, including non-ASCII, is left untouched.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// OSC (`ESC ] ... BEL|ST`), then CSI (`ESC [ params intermediates final`),
/// then two-byte escapes.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:\][^\x07\x1B]*(?:\x07|\x1B\\)|\[[0-?]*[ -/]*[@-~]|[@-Z\\-_])")
        .expect("ANSI escape pattern is valid")
});

static SPINNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[⠙⠹⠸⠴⠦⠧⠇⠏⠋]+").expect("spinner pattern is valid"));

/// Strip escape sequences and spinner glyphs from `raw`.
///
/// Idempotent: removing one sequence can splice together the pieces of
/// another (`ESC ESC[0m [31m`), so passes repeat until nothing changes.
pub fn strip_output(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let pass = strip_once(&current);
        match pass {
            Cow::Borrowed(_) => return current,
            Cow::Owned(next) => current = next,
        }
    }
}

fn strip_once(text: &str) -> Cow<'_, str> {
    match ANSI_ESCAPE.replace_all(text, "") {
        Cow::Borrowed(b) => SPINNER.replace_all(b, ""),
        Cow::Owned(o) => Cow::Owned(SPINNER.replace_all(&o, "").into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_csi_colours() {
        assert_eq!(strip_output("\x1b[31mred\x1b[0m plain"), "red plain");
    }

    #[test]
    fn removes_cursor_movement() {
        assert_eq!(strip_output("\x1b[2K\x1b[1Gpulling manifest"), "pulling manifest");
        assert_eq!(strip_output("\x1b[?25lhidden\x1b[?25h"), "hidden");
    }

    #[test]
    fn removes_osc_title() {
        assert_eq!(strip_output("\x1b]0;ollama\x07>>> "), ">>> ");
        assert_eq!(strip_output("\x1b]8;;http://x\x1b\\link"), "link");
    }

    #[test]
    fn removes_spinner_glyphs() {
        assert_eq!(strip_output("⠙ ⠹⠸ loading ⠋"), "  loading ");
    }

    #[test]
    fn keeps_non_ascii_text() {
        let text = "模型列表: llama3 — ✓ done ⣿";
        assert_eq!(strip_output(text), text);
    }

    #[test]
    fn spliced_sequences_are_removed() {
        assert_eq!(strip_output("a\x1b\x1b[0m[31mb"), "ab");
        assert_eq!(strip_output("a\x1b⠋[0mb"), "ab");
    }

    #[test]
    fn idempotent_on_mixed_input() {
        let samples = [
            "\x1b[1m⠙ bold\x1b[0m text",
            "a\x1b\x1b[0m[31mb",
            "lone escape \x1b",
            "\x1b]unterminated osc",
            "plain",
            "",
        ];
        for sample in samples {
            let once = strip_output(sample);
            assert_eq!(strip_output(&once), once, "sample {sample:?}");
        }
    }

    #[test]
    fn malformed_fragments_do_not_panic() {
        let _ = strip_output("\x1b[");
        let _ = strip_output("\x1b]");
        let _ = strip_output("\x1b[999999999999999999999999m");
    }
}
