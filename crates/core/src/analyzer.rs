//! Content analysis: turns a narration script or a markdown outline into an
//! ordered list of [`SlideChunk`]s.
//!
//! Prose is segmented at sentence boundaries. A new topic starts at a
//! transition word ("today", "first", "next", "finally", ...) or at a numeric
//! enumeration ("three key concepts"). Segments are then split or merged so the
//! deck lands inside `[1, 7]` slides.

use std::{ops::Range, sync::LazyLock};

use regex::Regex;
use tracing::debug;

use crate::{
    error::{Result, SlidecastError},
    types::{
        ContentType, MAX_BULLET_WORDS, MAX_KEY_POINTS, MAX_SLIDES, MIN_SLIDES, Script, SlideChunk,
    },
};

/// Words of narration per slide when no target is given.
pub const WORDS_PER_SLIDE: usize = 60;

const TOPIC_MARKERS: &[&str] = &[
    "today", "first", "firstly", "second", "secondly", "third", "thirdly", "next", "finally",
    "lastly",
];

const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "of", "to", "in", "on", "for", "with", "that", "which",
    "so", "really", "very", "just", "actually", "basically", "is", "are", "be", "as", "at", "by",
    "this", "it", "we", "you",
];

const LEADING_CONJUNCTIONS: &[&str] = &["and ", "or ", "plus ", "as well as ", "but ", "then "];

static ENUMERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(two|three|four|five|six|seven|eight|nine|ten|\d+)\s+(?:(?:key|main|core|big|important|simple|essential|major)\s+)?(concepts|topics|ideas|steps|points|things|lessons|pillars|areas|principles|ways|reasons|parts|questions|tips|rules|stages|phases|skills|tools)\b",
    )
    .expect("enumeration pattern is valid")
});

static CLAUSE_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[;,]|\s\(?\d{1,2}[.)]\s|\s\([a-z]\)\s").expect("clause pattern is valid")
});

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+•]|\(?\d{1,2}[.)]|\([a-z]\))\s+").expect("list marker pattern is valid")
});

/// Number of slides aimed for when the caller gives no target.
pub fn target_slide_count(word_count: usize) -> usize {
    word_count.div_ceil(WORDS_PER_SLIDE).clamp(MIN_SLIDES, MAX_SLIDES)
}

/// Analyze a script, dispatching on its shape (markdown outline or prose).
pub fn analyze(script: &Script, max_slides: Option<usize>) -> Result<Vec<SlideChunk>> {
    let cap = max_slides.map_or(MAX_SLIDES, |m| m.clamp(MIN_SLIDES, MAX_SLIDES));
    let chunks = if script.is_markdown() {
        let fallback = script.title().unwrap_or("Overview");
        let chunks = markdown_chunks(script.text(), fallback)?;
        cap_chunks(chunks, cap)
    } else {
        // A caller maximum only caps the deck; the aim still comes from the word count.
        let aim = target_slide_count(word_count(script.text())).min(cap);
        segment_prose(script.text(), aim, cap)?
    };

    if chunks.is_empty() {
        // Underflow: every accepted script gets at least an opening title slide.
        let heading = script.title().unwrap_or("Untitled").to_string();
        return Ok(vec![SlideChunk {
            heading,
            subheading: None,
            key_points: Vec::new(),
            suggested: ContentType::Title,
            source_range: 0..script.text().len(),
        }]);
    }
    Ok(chunks)
}

/// Segment free-form narration into chunks, aiming for `target_slides`
/// (derived from the word count when absent) and never exceeding 7.
pub fn analyze_script(text: &str, target_slides: Option<usize>) -> Result<Vec<SlideChunk>> {
    match target_slides {
        Some(t) => {
            let t = t.clamp(MIN_SLIDES, MAX_SLIDES);
            segment_prose(text, t, t)
        }
        None => segment_prose(text, target_slide_count(word_count(text)), MAX_SLIDES),
    }
}

/// Segment prose, splitting toward `aim` slides and merging down to `cap`.
fn segment_prose(text: &str, aim: usize, cap: usize) -> Result<Vec<SlideChunk>> {
    if text.trim().is_empty() {
        return Err(SlidecastError::InvalidScript {
            reason: "script is empty".to_string(),
        });
    }

    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Err(SlidecastError::InvalidScript {
            reason: "script contains no words".to_string(),
        });
    }

    let mut segments = segment(sentences);
    split_toward(&mut segments, aim);

    let chunks: Vec<SlideChunk> = segments.iter().flat_map(Segment::to_chunks).collect();
    debug!(words = word_count(text), aim, cap, natural = chunks.len(), "segmented script");

    Ok(cap_chunks(chunks, cap))
}

/// Parse a markdown outline: `# ` starts a chunk, `## ` adds a subheading,
/// `- `/`* ` lines are bullets.
pub fn analyze_markdown(text: &str) -> Result<Vec<SlideChunk>> {
    let chunks = markdown_chunks(text, "Overview")?;
    Ok(cap_chunks(chunks, MAX_SLIDES))
}

/// Split text into at most `max_bullets` short bullets on commas, semicolons,
/// inline enumerations and leading conjunctions.
pub fn extract_bullets(text: &str, max_bullets: usize) -> Vec<String> {
    let mut pieces: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = strip_list_marker(line.trim());
        // "three topics: a, b and c" -> only the list after the colon matters.
        let line = match line.split_once(':') {
            Some((_, rest)) if rest.contains(',') || rest.contains(';') => rest,
            _ => line,
        };
        pieces.extend(CLAUSE_SPLIT.split(line).map(str::to_string));
    }

    if pieces.len() == 1 && pieces[0].split_whitespace().count() > MAX_BULLET_WORDS {
        let single = pieces.remove(0);
        pieces.extend(single.split(" and ").map(str::to_string));
    }

    pieces
        .iter()
        .filter_map(|piece| condense(strip_conjunction(piece.trim()), MAX_BULLET_WORDS))
        .take(max_bullets)
        .collect()
}

/// Classify a piece of text as a title, a question or body content.
pub fn detect_content_type(text: &str) -> ContentType {
    let trimmed = text.trim();
    if trimmed.ends_with('?') {
        return ContentType::Question;
    }

    let lines: Vec<&str> = trimmed.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let list_lines = lines.iter().filter(|l| LIST_MARKER.is_match(l)).count();
    if lines.len() >= 2 && list_lines >= 2 {
        return ContentType::Content;
    }

    let has_punctuation = trimmed
        .chars()
        .any(|c| matches!(c, '.' | ',' | ';' | ':' | '!'));
    if word_count(trimmed) <= 8 && !has_punctuation {
        ContentType::Title
    } else {
        ContentType::Content
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Clone)]
struct Sentence {
    text: String,
    range: Range<usize>,
}

fn split_sentences(text: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '.' | '!' | '?' => chars.peek().is_none_or(|(_, next)| next.is_whitespace()),
            '\n' => chars.peek().is_some_and(|(_, next)| *next == '\n'),
            _ => false,
        };
        if boundary {
            let end = i + c.len_utf8();
            push_sentence(text, start..end, &mut sentences);
            start = end;
        }
    }
    push_sentence(text, start..text.len(), &mut sentences);
    sentences
}

fn push_sentence(text: &str, range: Range<usize>, out: &mut Vec<Sentence>) {
    let slice = &text[range.clone()];
    let trimmed = slice.trim();
    if !trimmed.chars().any(char::is_alphanumeric) {
        return;
    }
    let lead = slice.len() - slice.trim_start().len();
    let start = range.start + lead;
    out.push(Sentence {
        text: trimmed.split_whitespace().collect::<Vec<_>>().join(" "),
        range: start..start + trimmed.len(),
    });
}

#[derive(Debug)]
struct Segment {
    sentences: Vec<Sentence>,
    /// A numeric enumeration introducing a colon list, e.g. "three topics: a, b, c".
    listing: Option<Listing>,
}

#[derive(Debug)]
struct Listing {
    intro: String,
    noun: String,
    items: Vec<String>,
}

impl Segment {
    fn words(&self) -> usize {
        self.sentences.iter().map(|s| word_count(&s.text)).sum()
    }

    fn range(&self) -> Range<usize> {
        let start = self.sentences.first().map_or(0, |s| s.range.start);
        let end = self.sentences.last().map_or(start, |s| s.range.end);
        start..end
    }

    fn chunk_count(&self) -> usize {
        if self.listing.is_some() { 2 } else { 1 }
    }

    fn splittable(&self) -> bool {
        self.listing.is_none() && self.sentences.len() >= 2
    }

    fn to_chunks(&self) -> Vec<SlideChunk> {
        let range = self.range();

        if let Some(listing) = &self.listing {
            return vec![
                SlideChunk {
                    heading: clean_heading(&listing.intro),
                    subheading: None,
                    key_points: Vec::new(),
                    suggested: ContentType::Title,
                    source_range: range.clone(),
                },
                SlideChunk {
                    heading: capitalize(&listing.noun),
                    subheading: None,
                    key_points: listing.items.clone(),
                    suggested: ContentType::Content,
                    source_range: range,
                },
            ];
        }

        let Some((first, rest)) = self.sentences.split_first() else {
            return Vec::new();
        };

        if rest.is_empty() {
            // A lone sentence with a colon list keeps the list as its bullets.
            if let Some((intro, list)) = first.text.split_once(':') {
                let items = extract_bullets(list, MAX_KEY_POINTS);
                if items.len() >= 2 {
                    return vec![SlideChunk {
                        heading: clean_heading(intro),
                        subheading: None,
                        key_points: items,
                        suggested: ContentType::Content,
                        source_range: range,
                    }];
                }
            }
            let heading = clean_heading(&first.text);
            return vec![SlideChunk {
                suggested: detect_content_type(&first.text),
                heading,
                subheading: None,
                key_points: Vec::new(),
                source_range: range,
            }];
        }

        let key_points: Vec<String> = if rest.len() == 1 {
            extract_bullets(&rest[0].text, MAX_KEY_POINTS)
        } else {
            rest.iter()
                .filter_map(|s| condense(&s.text, MAX_BULLET_WORDS))
                .take(MAX_KEY_POINTS)
                .collect()
        };
        let suggested = if key_points.last().is_some_and(|p| p.ends_with('?')) {
            ContentType::Question
        } else {
            ContentType::Content
        };

        vec![SlideChunk {
            heading: clean_heading(&first.text),
            subheading: None,
            key_points,
            suggested,
            source_range: range,
        }]
    }
}

fn segment(sentences: Vec<Sentence>) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut after_listing = false;

    for sentence in sentences {
        let listing = listing_of(&sentence.text);
        let starts_topic = segments.is_empty()
            || after_listing
            || starts_with_marker(&sentence.text)
            || listing.is_some()
            || ENUMERATION.is_match(&sentence.text);

        after_listing = listing.is_some();
        if starts_topic {
            segments.push(Segment {
                sentences: vec![sentence],
                listing,
            });
        } else if let Some(current) = segments.last_mut() {
            current.sentences.push(sentence);
        }
    }
    segments
}

fn listing_of(sentence: &str) -> Option<Listing> {
    let (intro, list) = sentence.split_once(':')?;
    let caps = ENUMERATION.captures(intro)?;
    let items = extract_bullets(list, MAX_KEY_POINTS);
    if items.len() < 2 {
        return None;
    }
    Some(Listing {
        intro: intro.to_string(),
        noun: caps[2].to_lowercase(),
        items,
    })
}

fn starts_with_marker(sentence: &str) -> bool {
    sentence
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .is_some_and(|w| TOPIC_MARKERS.contains(&w.as_str()))
}

/// Split the wordiest prose segments at sentence boundaries until `aim`
/// chunks exist or nothing is left to split.
fn split_toward(segments: &mut Vec<Segment>, aim: usize) {
    loop {
        let total: usize = segments.iter().map(Segment::chunk_count).sum();
        if total >= aim {
            return;
        }
        let Some(idx) = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.splittable())
            .max_by_key(|(i, s)| (s.words(), std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
        else {
            return;
        };

        let seg = segments.remove(idx);
        let at = balanced_split_point(&seg.sentences);
        let mut head = seg.sentences;
        let tail = head.split_off(at);
        segments.insert(idx, Segment { sentences: tail, listing: None });
        segments.insert(idx, Segment { sentences: head, listing: None });
    }
}

fn balanced_split_point(sentences: &[Sentence]) -> usize {
    let total: usize = sentences.iter().map(|s| word_count(&s.text)).sum();
    let mut best = 1;
    let mut best_gap = usize::MAX;
    let mut running = 0;
    for (i, s) in sentences.iter().enumerate().take(sentences.len() - 1) {
        running += word_count(&s.text);
        let gap = running.abs_diff(total - running);
        if gap < best_gap {
            best_gap = gap;
            best = i + 1;
        }
    }
    best
}

/// Merge the lightest adjacent pair until at most `cap` chunks remain.
fn cap_chunks(mut chunks: Vec<SlideChunk>, cap: usize) -> Vec<SlideChunk> {
    while chunks.len() > cap {
        let Some(i) = (0..chunks.len() - 1)
            .min_by_key(|&i| chunk_words(&chunks[i]) + chunk_words(&chunks[i + 1]))
        else {
            break;
        };
        let second = chunks.remove(i + 1);
        let first = &mut chunks[i];

        let mut points = std::mem::take(&mut first.key_points);
        if let Some(sub) = first.subheading.take() {
            points.insert(0, sub);
        }
        points.push(second.heading);
        points.extend(second.key_points);
        points.truncate(MAX_KEY_POINTS);

        first.key_points = points
            .into_iter()
            .filter_map(|p| condense(&p, MAX_BULLET_WORDS))
            .collect();
        first.suggested = if second.suggested == ContentType::Question {
            ContentType::Question
        } else {
            ContentType::Content
        };
        first.source_range = first.source_range.start..second.source_range.end;
    }
    chunks
}

fn chunk_words(chunk: &SlideChunk) -> usize {
    word_count(&chunk.heading) + chunk.key_points.iter().map(|p| word_count(p)).sum::<usize>()
}

fn markdown_chunks(text: &str, fallback_title: &str) -> Result<Vec<SlideChunk>> {
    if text.trim().is_empty() {
        return Err(SlidecastError::InvalidScript {
            reason: "outline is empty".to_string(),
        });
    }

    let mut chunks: Vec<SlideChunk> = Vec::new();
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        let line_range = offset..offset + raw.trim_end().len();
        offset += raw.len();
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(heading) = line.strip_prefix("# ") {
            chunks.push(new_markdown_chunk(heading.trim(), line_range));
            continue;
        }

        if let Some(sub) = line.strip_prefix("## ") {
            match chunks.last_mut() {
                Some(current) if current.subheading.is_none() && current.key_points.is_empty() => {
                    current.subheading = Some(sub.trim().to_string());
                    current.source_range.end = line_range.end;
                }
                _ => chunks.push(new_markdown_chunk(sub.trim(), line_range)),
            }
            continue;
        }

        let points: Vec<String> = if LIST_MARKER.is_match(line) {
            condense(strip_list_marker(line), MAX_BULLET_WORDS).into_iter().collect()
        } else {
            let line = line.trim_start_matches('#').trim();
            extract_bullets(line, MAX_KEY_POINTS)
        };
        if points.is_empty() {
            continue;
        }

        match chunks.last_mut() {
            Some(current) => {
                current.key_points.extend(points);
                current.source_range.end = line_range.end;
            }
            None => {
                let mut orphan = new_markdown_chunk(fallback_title, line_range);
                orphan.key_points = points;
                chunks.push(orphan);
            }
        }
    }

    let mut expanded = Vec::with_capacity(chunks.len());
    for mut chunk in chunks {
        chunk.suggested = if chunk.heading.ends_with('?') {
            ContentType::Question
        } else if chunk.key_points.is_empty() {
            ContentType::Title
        } else {
            ContentType::Content
        };

        if chunk.key_points.len() <= MAX_KEY_POINTS {
            expanded.push(chunk);
            continue;
        }
        // Overflowing sections spill into continuation slides.
        let overflow: Vec<String> = chunk.key_points.drain(MAX_KEY_POINTS..).collect();
        let heading = chunk.heading.clone();
        let range = chunk.source_range.clone();
        expanded.push(chunk);
        for points in overflow.chunks(MAX_KEY_POINTS) {
            expanded.push(SlideChunk {
                heading: format!("{heading} (continued)"),
                subheading: None,
                key_points: points.to_vec(),
                suggested: ContentType::Content,
                source_range: range.clone(),
            });
        }
    }
    Ok(expanded)
}

fn new_markdown_chunk(heading: &str, range: Range<usize>) -> SlideChunk {
    SlideChunk {
        heading: heading.to_string(),
        subheading: None,
        key_points: Vec::new(),
        suggested: ContentType::Title,
        source_range: range,
    }
}

fn strip_list_marker(line: &str) -> &str {
    match LIST_MARKER.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

fn strip_conjunction(piece: &str) -> &str {
    let lower = piece.to_lowercase();
    for conj in LEADING_CONJUNCTIONS {
        if lower.starts_with(conj) && piece.is_char_boundary(conj.len()) {
            return piece[conj.len()..].trim_start();
        }
    }
    piece
}

/// Trim a clause to at most `max_words`, dropping trailing filler when it had
/// to be cut. Returns `None` for clauses with no words.
fn condense(text: &str, max_words: usize) -> Option<String> {
    let text = text
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | ',' | ';' | ':'))
        .trim();
    let mut words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || !text.chars().any(char::is_alphanumeric) {
        return None;
    }

    if words.len() > max_words {
        words.truncate(max_words);
        while words.len() > 1 {
            let last = words[words.len() - 1]
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if FILLER_WORDS.contains(&last.as_str()) {
                words.pop();
            } else {
                break;
            }
        }
        if let Some(last) = words.last_mut() {
            *last = last.trim_end_matches(|c: char| matches!(c, ',' | ';' | ':'));
        }
    }

    Some(capitalize(&words.join(" ")))
}

fn clean_heading(sentence: &str) -> String {
    let mut text = sentence.trim();
    // "First, ..." -> "..."
    if let Some((lead, rest)) = text.split_once(',')
        && !lead.contains(' ')
        && TOPIC_MARKERS.contains(&lead.to_lowercase().as_str())
    {
        text = rest.trim();
    }
    condense(text, MAX_BULLET_WORDS).unwrap_or_else(|| capitalize(text))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sentence_becomes_one_title_slide() {
        let chunks = analyze_script("Welcome to the AI workshop.", None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading, "Welcome to the AI workshop");
        assert!(chunks[0].key_points.is_empty());
    }

    #[test]
    fn enumerated_topics_become_title_and_bullets() {
        let text = "Today we cover three topics: prompt engineering, personalization, and second brain.";
        let chunks = analyze_script(text, None).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].suggested, ContentType::Title);
        assert_eq!(chunks[0].heading, "Today we cover three topics");
        assert_eq!(
            chunks[1].key_points,
            vec!["Prompt engineering", "Personalization", "Second brain"]
        );
    }

    #[test]
    fn many_topic_markers_merge_down_to_seven() {
        let text = "First, we set goals. Next, we gather data. Next, we clean it. \
                    Next, we explore it. Next, we model it. Next, we test it. \
                    Next, we tune it. Next, we ship it. Next, we monitor it. \
                    Finally, we retire it. Lastly, we celebrate.";
        let chunks = analyze_script(text, None).unwrap();
        assert_eq!(chunks.len(), 7);
        for chunk in &chunks {
            assert!(chunk.key_points.len() <= MAX_KEY_POINTS);
        }
    }

    #[test]
    fn empty_script_is_rejected() {
        assert!(matches!(
            analyze_script("", None),
            Err(SlidecastError::InvalidScript { .. })
        ));
        assert!(matches!(
            analyze_script("   \n  ", None),
            Err(SlidecastError::InvalidScript { .. })
        ));
        assert!(matches!(
            analyze_script("... !!!", None),
            Err(SlidecastError::InvalidScript { .. })
        ));
    }

    #[test]
    fn long_prose_is_split_toward_word_target() {
        let sentence = "Automation saves hours every single week for busy teams that adopt it early. ";
        let text = sentence.repeat(20); // 260 words -> 5 slides
        let chunks = analyze_script(&text, None).unwrap();
        assert_eq!(target_slide_count(word_count(&text)), 5);
        assert_eq!(chunks.len(), 5);
    }

    #[test]
    fn explicit_target_merges_topics() {
        let text = "First, one thing. Next, another thing. Next, a third thing. Finally, the last thing.";
        let chunks = analyze_script(text, Some(2)).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn max_slides_caps_without_inflating_short_scripts() {
        let script = Script::new("We start small. Then we grow. Teams adopt it. Results follow.");
        let natural = analyze(&script, None).unwrap();
        assert_eq!(natural.len(), 1);
        assert_eq!(analyze(&script, Some(7)).unwrap().len(), natural.len());
    }

    #[test]
    fn max_slides_still_caps_long_scripts() {
        let text = "First, one thing. Next, another thing. Next, a third thing. Finally, the last thing.";
        let uncapped = analyze(&Script::new(text), None).unwrap().len();
        let capped = analyze(&Script::new(text), Some(2)).unwrap();
        assert!(capped.len() <= 2);
        assert!(capped.len() <= uncapped);
    }

    #[test]
    fn source_ranges_point_into_the_script() {
        let text = "Welcome everyone.\n\nFirst, we look at prompts.";
        let chunks = analyze_script(text, Some(2)).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(&text[chunks[1].source_range.clone()], "First, we look at prompts.");
        assert_eq!(chunks[1].heading, "We look at prompts");
    }

    #[test]
    fn bullets_never_exceed_twelve_words() {
        let text = "We will discuss how the new onboarding process dramatically reduces the time it takes for a new engineer to ship, \
                    and why that matters for retention";
        for bullet in extract_bullets(text, 5) {
            assert!(word_count(&bullet) <= MAX_BULLET_WORDS, "{bullet}");
        }
    }

    #[test]
    fn truncated_bullets_drop_trailing_filler() {
        let bullets = extract_bullets(
            "one two three four five six seven eight nine ten eleven the twelve thirteen",
            3,
        );
        assert_eq!(bullets, vec!["One two three four five six seven eight nine ten eleven"]);
    }

    #[test]
    fn bullets_split_on_semicolons_and_enumerations() {
        let bullets = extract_bullets("collect data; clean it 2) train a model", 5);
        assert_eq!(bullets, vec!["Collect data", "Clean it", "Train a model"]);

        let capped = extract_bullets("a, b, c, d, e, f, g", 3);
        assert_eq!(capped, vec!["A", "B", "C"]);
    }

    #[test]
    fn content_type_detection() {
        assert_eq!(detect_content_type("Any questions?"), ContentType::Question);
        assert_eq!(detect_content_type("AI Automation Workshop"), ContentType::Title);
        assert_eq!(
            detect_content_type("- first point\n- second point"),
            ContentType::Content
        );
        assert_eq!(
            detect_content_type("This sentence has punctuation, so it is content."),
            ContentType::Content
        );
        assert_eq!(
            detect_content_type("one two three four five six seven eight nine"),
            ContentType::Content
        );
    }

    #[test]
    fn markdown_outline_maps_headings_and_bullets() {
        let outline = "# Welcome\n## AI Automation Workshop\n# Topics\n- Prompt engineering\n- Personalization\n- Second brain\n# Questions?\n";
        let chunks = analyze_markdown(outline).unwrap();
        assert_eq!(chunks.len(), 3);

        assert_eq!(chunks[0].heading, "Welcome");
        assert_eq!(chunks[0].subheading.as_deref(), Some("AI Automation Workshop"));
        assert_eq!(chunks[0].suggested, ContentType::Title);

        assert_eq!(chunks[1].key_points.len(), 3);
        assert_eq!(chunks[1].suggested, ContentType::Content);

        assert_eq!(chunks[2].heading, "Questions?");
        assert_eq!(chunks[2].suggested, ContentType::Question);
    }

    #[test]
    fn markdown_overflow_spills_into_continuation() {
        let outline = "# Tools\n- a\n- b\n- c\n- d\n- e\n- f\n- g\n";
        let chunks = analyze_markdown(outline).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].key_points.len(), 5);
        assert_eq!(chunks[1].heading, "Tools (continued)");
        assert_eq!(chunks[1].key_points, vec!["F", "G"]);
    }

    #[test]
    fn orphan_bullets_get_a_title_from_the_script() {
        let script = Script::new("- loose point\n# Real heading\n- detail").with_title("Intro");
        let chunks = analyze(&script, None).unwrap();
        assert_eq!(chunks[0].heading, "Intro");
        assert_eq!(chunks[0].key_points, vec!["Loose point"]);
        assert_eq!(chunks[1].heading, "Real heading");
    }
}
