//! Splitting of long replies into Telegram-sized messages.
//!
//! Lengths are measured in UTF-16 code units, which is how Telegram counts
//! its 4096 limit. Lines are packed greedily; a line that cannot fit in an
//! empty chunk is hard-cut on a character boundary. When a split lands
//! inside a fenced code block the chunk is closed with a fence and the next
//! one reopens it with the same opener line, so each chunk renders on its own.

/// Telegram hard limit for text messages.
pub const TELEGRAM_MAX_LEN: usize = 4096;

const FENCE: &str = "```";
const MIN_LIMIT: usize = 16;

/// Split `text` into chunks of at most `max_len` UTF-16 units.
///
/// Returns an empty vector for empty input. Limits below 16 are raised to 16.
pub fn chunk_markdown(text: &str, max_len: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let limit = max_len.max(MIN_LIMIT);
    if text_len(text) <= limit {
        return vec![text.to_string()];
    }

    let mut builder = ChunkBuilder::new(limit);
    for line in text.split('\n') {
        builder.push_line(line);
    }
    builder.finish()
}

/// Length of `text` as Telegram counts it.
pub fn text_len(text: &str) -> usize {
    text.encode_utf16().count()
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with(FENCE)
}

struct ChunkBuilder {
    limit: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
    /// Set once the current chunk carries text beyond a reopened fence.
    dirty: bool,
    /// Opener line of the fence that is open at the end of `current`.
    open_fence: Option<String>,
}

impl ChunkBuilder {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            chunks: Vec::new(),
            current: String::new(),
            current_len: 0,
            dirty: false,
            open_fence: None,
        }
    }

    /// Room that must stay free to close the open fence.
    fn closing_reserve(fence_open: bool) -> usize {
        if fence_open { FENCE.len() + 1 } else { 0 }
    }

    fn separator(&self) -> usize {
        usize::from(!self.current.is_empty())
    }

    fn push_line(&mut self, line: &str) {
        if line.is_empty() && !self.dirty && self.open_fence.is_none() {
            // blank line at a chunk boundary
            if !self.chunks.is_empty() {
                return;
            }
        }

        let mut rest = line;
        loop {
            let rest_len = text_len(rest);
            let toggles = rest.len() == line.len() && is_fence(rest);
            let fence_open_after = if toggles {
                self.open_fence.is_none()
            } else {
                self.open_fence.is_some()
            };
            let needed = self.current_len
                + self.separator()
                + rest_len
                + Self::closing_reserve(fence_open_after);

            if needed <= self.limit {
                self.append(rest, rest_len);
                if toggles {
                    self.open_fence = if self.open_fence.is_some() {
                        None
                    } else {
                        Some(reopen_line(rest, self.limit))
                    };
                }
                return;
            }

            if self.dirty {
                self.flush();
                continue;
            }

            // The line does not fit even in a fresh chunk: hard cut.
            let room = self.limit.saturating_sub(
                self.current_len
                    + self.separator()
                    + Self::closing_reserve(self.open_fence.is_some()),
            );
            let (head, tail) = split_at_units(rest, room.max(1));
            self.append(head, text_len(head));
            self.flush();
            if tail.is_empty() {
                return;
            }
            rest = tail;
        }
    }

    fn append(&mut self, text: &str, len: usize) {
        if !self.current.is_empty() {
            self.current.push('\n');
            self.current_len += 1;
        }
        self.current.push_str(text);
        self.current_len += len;
        self.dirty = true;
    }

    fn flush(&mut self) {
        let mut chunk = std::mem::take(&mut self.current);
        chunk.truncate(chunk.trim_end_matches('\n').len());
        if let Some(opener) = &self.open_fence {
            chunk.push('\n');
            chunk.push_str(FENCE);
            self.current = opener.clone();
        }
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
        self.current_len = text_len(&self.current);
        self.dirty = false;
    }

    fn finish(mut self) -> Vec<String> {
        if self.dirty {
            self.chunks.push(self.current);
        }
        self.chunks
    }
}

/// Opener to repeat at the top of a continuation chunk. Oversized openers
/// fall back to a bare fence so a continuation always has room for text.
fn reopen_line(opener: &str, limit: usize) -> String {
    let opener = opener.trim();
    if text_len(opener) > limit / 2 {
        FENCE.to_string()
    } else {
        opener.to_string()
    }
}

/// Split `text` after at most `units` UTF-16 units, on a char boundary.
/// Always takes at least one character.
fn split_at_units(text: &str, units: usize) -> (&str, &str) {
    let mut used = 0;
    for (idx, ch) in text.char_indices() {
        let width = ch.len_utf16();
        if used + width > units && idx > 0 {
            return text.split_at(idx);
        }
        used += width;
    }
    (text, "")
}
