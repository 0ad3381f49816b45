//! Item-block segmentation: reassemble logical item records from the raw
//! line range between two anchors.

/// Join wrapped item lines. The Coop and ICA layouts mark a logical line
/// that continues onto the next physical line with a trailing `*`; the
/// continuation line is appended verbatim and then skipped.
pub fn join_wrapped(lines: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip = false;
    for (i, raw) in lines.iter().enumerate() {
        if skip {
            skip = false;
            continue;
        }
        let mut line = raw.trim().to_string();
        if line.ends_with('*')
            && let Some(next) = lines.get(i + 1)
        {
            line.push_str(next);
            skip = true;
        }
        out.push(line);
    }
    out
}
