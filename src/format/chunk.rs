//! Splitting formatted output into transport-sized messages.

/// Default chunk length, in characters, before escaping and wrapping.
///
/// Telegram rejects messages longer than 4096 characters; this leaves room
/// for the `<pre>` wrapper and typical entity expansion.
pub const DEFAULT_CHUNK_LENGTH: usize = 3800;

/// Presentation applied to each chunk when it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Markup {
    /// Fixed-width HTML block with reserved characters escaped.
    #[default]
    Html,
    /// The raw text, no escaping and no wrapper.
    Plain,
}

/// A contiguous slice of a formatted block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position among its siblings, starting at 0.
    pub index: usize,
    /// The unescaped slice of the formatted block.
    pub text: String,
}

impl Chunk {
    /// Renders the chunk for sending with the given markup.
    pub fn render(&self, markup: Markup) -> String {
        match markup {
            Markup::Html => format!("<pre>{}</pre>", escape_html(&self.text)),
            Markup::Plain => self.text.clone(),
        }
    }
}

/// Escapes the characters the Bot API's HTML mode reserves.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Splits `block` into slices of at most `max_len` characters.
///
/// Slices are contiguous and in order, so joining their `text` reproduces
/// `block` exactly. Boundaries fall on character boundaries; a `max_len` of
/// zero is treated as one.
pub fn chunk(block: &str, max_len: usize) -> Vec<Chunk> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in block.char_indices() {
        if count == max_len {
            chunks.push(Chunk {
                index: chunks.len(),
                text: block[start..offset].to_string(),
            });
            start = offset;
            count = 0;
        }
        count += 1;
    }

    if start < block.len() {
        chunks.push(Chunk {
            index: chunks.len(),
            text: block[start..].to_string(),
        });
    }

    chunks
}

/// Chunk length and markup for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputChunker {
    max_len: usize,
    markup: Markup,
}

impl Default for OutputChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_LENGTH, Markup::Html)
    }
}

impl OutputChunker {
    pub fn new(max_len: usize, markup: Markup) -> Self {
        Self { max_len, markup }
    }

    pub fn markup(&self) -> Markup {
        self.markup
    }

    /// Splits `block` into chunks.
    pub fn split(&self, block: &str) -> Vec<Chunk> {
        chunk(block, self.max_len)
    }

    /// Splits `block` and renders every chunk with this chunker's markup.
    pub fn render(&self, block: &str) -> Vec<String> {
        self.split(block)
            .iter()
            .map(|c| c.render(self.markup))
            .collect()
    }
}
