//! Layout selection and the visual variety pass.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    theme::Theme,
    types::{ContentType, Layout, SlideBody, SlideChunk, SlidePosition, SlideSpec},
};

/// Words on either side of "framework"/"methodology" searched for an acronym.
const FRAMEWORK_WINDOW: usize = 6;

const FRAMEWORK_KEYWORDS: &[&str] = &["framework", "frameworks", "methodology", "methodologies"];

/// Pick a layout for one chunk given the layouts already chosen before it.
pub fn select_layout(
    chunk: &SlideChunk,
    prior_layouts: &[Layout],
    position: SlidePosition,
) -> Layout {
    if detect_framework(&chunk.full_text()).is_some() {
        return Layout::Framework;
    }

    let layout = match position {
        SlidePosition::First => Layout::Title,
        SlidePosition::Last if chunk.ends_with_question() => Layout::Question,
        SlidePosition::Last => Layout::Content,
        SlidePosition::Middle => match chunk.suggested {
            ContentType::Title => Layout::Title,
            ContentType::Question => Layout::Question,
            ContentType::Content => Layout::Content,
        },
    };

    if layout == Layout::Question && prior_layouts.last() == Some(&Layout::Question) {
        Layout::Content
    } else {
        layout
    }
}

/// Find an all-caps acronym (three letters or more) near the word
/// "framework" or "methodology", e.g. "the CRAFT framework".
pub fn detect_framework(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .collect();

    let anchors: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| FRAMEWORK_KEYWORDS.contains(&t.to_lowercase().as_str()))
        .map(|(i, _)| i)
        .collect();
    if anchors.is_empty() {
        return None;
    }

    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| is_acronym(t))
        .find(|(i, _)| anchors.iter().any(|a| a.abs_diff(*i) <= FRAMEWORK_WINDOW))
        .map(|(_, t)| t.to_string())
}

fn is_acronym(token: &str) -> bool {
    token.len() >= 3 && token.chars().all(|c| c.is_ascii_uppercase())
}

/// Second pass over the whole deck: no two questions in a row and no three
/// identical layouts in a row.
pub fn enforce_variety(layouts: Vec<Layout>) -> Vec<Layout> {
    let weights = vec![0; layouts.len()];
    enforce_variety_weighted(layouts, &weights)
}

/// Like [`enforce_variety`], but a run of three is broken at the slide with
/// the lowest weight (fewest key points). Ties go to the middle slide, and
/// the opening slide is never changed.
fn enforce_variety_weighted(mut layouts: Vec<Layout>, weights: &[usize]) -> Vec<Layout> {
    let n = layouts.len();
    // Each fix strictly reduces the number of violations; the bound is a backstop.
    for _ in 0..n * 4 {
        let mut changed = false;

        for i in 1..n {
            if layouts[i] == Layout::Question && layouts[i - 1] == Layout::Question {
                // A closing question is the stronger slide; keep it.
                let weaker = if i + 1 == n { i - 1 } else { i };
                layouts[weaker] = Layout::Content;
                changed = true;
            }
        }

        for i in 2..n {
            if layouts[i - 2] == layouts[i - 1] && layouts[i - 1] == layouts[i] {
                let weakest = [i - 1, i, i - 2]
                    .into_iter()
                    .filter(|&j| j > 0)
                    .min_by_key(|&j| weights.get(j).copied().unwrap_or(0))
                    .unwrap_or(i - 1);
                layouts[weakest] = match layouts[weakest] {
                    Layout::Content => Layout::Title,
                    _ => Layout::Content,
                };
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }
    layouts
}

/// Turn analyzer chunks into finalized slide specs for `theme`.
pub fn plan_slides(
    chunks: &[SlideChunk],
    theme: Theme,
    duration_hints: &BTreeMap<usize, u64>,
) -> Vec<SlideSpec> {
    let count = chunks.len();
    let mut layouts: Vec<Layout> = Vec::with_capacity(count);
    for (index, chunk) in chunks.iter().enumerate() {
        let layout = select_layout(chunk, &layouts, SlidePosition::of(index, count));
        layouts.push(layout);
    }
    let weights: Vec<usize> = chunks.iter().map(|c| c.key_points.len()).collect();
    let layouts = enforce_variety_weighted(layouts, &weights);
    debug!(?layouts, "selected layouts");

    let palette = theme.palette();
    chunks
        .iter()
        .zip(layouts)
        .enumerate()
        .map(|(index, (chunk, layout))| SlideSpec {
            index,
            chunk: chunk.clone(),
            body: build_body(chunk, layout),
            theme,
            palette: palette.clone(),
            duration_ms: duration_hints.get(&index).copied(),
        })
        .collect()
}

fn build_body(chunk: &SlideChunk, layout: Layout) -> SlideBody {
    let heading = chunk.heading.clone();
    match layout {
        Layout::Title => {
            // Without a subheading the first point becomes the subtitle; the rest stay listed.
            let mut bullets = chunk.key_points.clone();
            let subtitle = match &chunk.subheading {
                Some(sub) => Some(sub.clone()),
                None if !bullets.is_empty() => Some(bullets.remove(0)),
                None => None,
            };
            SlideBody::Title {
                heading,
                subtitle,
                bullets,
            }
        }
        Layout::Content => SlideBody::Content {
            heading,
            bullets: chunk.key_points.clone(),
        },
        Layout::Question => {
            if heading.ends_with('?') {
                return SlideBody::Question {
                    prompt: heading,
                    bullets: chunk.key_points.clone(),
                };
            }
            let mut bullets = chunk.key_points.clone();
            let prompt = match bullets.last() {
                Some(last) if last.ends_with('?') => bullets.pop().unwrap_or_default(),
                _ => heading,
            };
            SlideBody::Question { prompt, bullets }
        }
        Layout::Framework => SlideBody::Framework {
            name: detect_framework(&chunk.full_text()).unwrap_or_default(),
            heading,
            bullets: chunk.key_points.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(heading: &str, points: &[&str], suggested: ContentType) -> SlideChunk {
        SlideChunk {
            heading: heading.to_string(),
            subheading: None,
            key_points: points.iter().map(|p| p.to_string()).collect(),
            suggested,
            source_range: 0..0,
        }
    }

    #[test]
    fn first_slide_is_a_title() {
        let c = chunk("Welcome to the AI workshop", &[], ContentType::Content);
        assert_eq!(select_layout(&c, &[], SlidePosition::First), Layout::Title);
    }

    #[test]
    fn last_slide_prefers_question_when_interrogative() {
        let q = chunk("Questions?", &[], ContentType::Question);
        assert_eq!(select_layout(&q, &[Layout::Content], SlidePosition::Last), Layout::Question);

        let c = chunk("Wrap up", &["Thanks for coming"], ContentType::Content);
        assert_eq!(select_layout(&c, &[Layout::Content], SlidePosition::Last), Layout::Content);
    }

    #[test]
    fn no_question_directly_after_question() {
        let q = chunk("Why does this matter?", &[], ContentType::Question);
        assert_eq!(
            select_layout(&q, &[Layout::Title, Layout::Question], SlidePosition::Middle),
            Layout::Content
        );
    }

    #[test]
    fn framework_acronym_near_keyword() {
        assert_eq!(
            detect_framework("We use the CRAFT framework for prompts"),
            Some("CRAFT".to_string())
        );
        assert_eq!(
            detect_framework("The methodology is simple: CODE your notes"),
            Some("CODE".to_string())
        );
        assert_eq!(detect_framework("AI is a framework for thinking"), None);
        assert_eq!(
            detect_framework("CRAFT one two three four five six seven framework"),
            None
        );
        assert_eq!(detect_framework("The CRAFT method"), None);
    }

    #[test]
    fn variety_breaks_runs_of_content() {
        let layouts = enforce_variety(vec![
            Layout::Title,
            Layout::Content,
            Layout::Content,
            Layout::Content,
            Layout::Content,
        ]);
        for window in layouts.windows(3) {
            assert!(!(window[0] == window[1] && window[1] == window[2]), "{layouts:?}");
        }
        assert!(layouts.iter().skip(1).any(|l| *l != Layout::Content));
    }

    #[test]
    fn variety_keeps_closing_question() {
        let layouts = enforce_variety(vec![Layout::Title, Layout::Question, Layout::Question]);
        assert_eq!(layouts, vec![Layout::Title, Layout::Content, Layout::Question]);

        let layouts = enforce_variety(vec![
            Layout::Title,
            Layout::Question,
            Layout::Question,
            Layout::Content,
        ]);
        assert_eq!(
            layouts,
            vec![Layout::Title, Layout::Question, Layout::Content, Layout::Content]
        );
    }

    #[test]
    fn variety_promotes_the_lightest_slide_in_a_run() {
        let chunks = vec![
            chunk("Welcome", &[], ContentType::Title),
            chunk("Goals", &["One", "Two", "Three"], ContentType::Content),
            chunk("Setup", &["Four", "Five", "Six"], ContentType::Content),
            chunk("Aside", &["Seven"], ContentType::Content),
            chunk("Wrap up", &["Eight", "Nine"], ContentType::Content),
        ];
        let specs = plan_slides(&chunks, Theme::Dark, &BTreeMap::new());
        let layouts: Vec<Layout> = specs.iter().map(SlideSpec::layout).collect();
        assert_eq!(
            layouts,
            vec![
                Layout::Title,
                Layout::Content,
                Layout::Content,
                Layout::Title,
                Layout::Content
            ]
        );
    }

    #[test]
    fn no_key_point_is_lost_in_layout() {
        let points = ["Alpha point", "Beta point", "Gamma point"];
        let chunks: Vec<SlideChunk> = (0..5)
            .map(|i| chunk(&format!("Topic {i}"), &points, ContentType::Content))
            .collect();
        let specs = plan_slides(&chunks, Theme::Dark, &BTreeMap::new());

        assert!(specs.iter().any(|s| s.layout() == Layout::Title && s.index > 0));
        for spec in &specs {
            let mut shown: Vec<&str> = spec.body.bullets().iter().map(String::as_str).collect();
            if let SlideBody::Title {
                subtitle: Some(sub), ..
            } = &spec.body
            {
                shown.push(sub);
            }
            for point in points {
                assert!(
                    shown.contains(&point),
                    "slide {} lost {point}: {:?}",
                    spec.index,
                    spec.body
                );
            }
        }
    }

    #[test]
    fn title_keeps_subheading_and_points() {
        let mut c = chunk("Welcome", &["Prompts", "Agents"], ContentType::Title);
        c.subheading = Some("AI Automation Workshop".into());
        assert_eq!(
            build_body(&c, Layout::Title),
            SlideBody::Title {
                heading: "Welcome".into(),
                subtitle: Some("AI Automation Workshop".into()),
                bullets: vec!["Prompts".into(), "Agents".into()],
            }
        );
    }

    #[test]
    fn already_varied_deck_is_untouched() {
        let deck = vec![Layout::Title, Layout::Content, Layout::Question];
        assert_eq!(enforce_variety(deck.clone()), deck);
    }

    #[test]
    fn plan_builds_bodies_and_duration_hints() {
        let chunks = vec![
            chunk("Welcome", &[], ContentType::Title),
            chunk("Topics", &["Prompt engineering", "Personalization"], ContentType::Content),
            chunk("Questions?", &[], ContentType::Question),
        ];
        let hints = BTreeMap::from([(1, 10_000)]);
        let specs = plan_slides(&chunks, Theme::Light, &hints);

        let layouts: Vec<Layout> = specs.iter().map(SlideSpec::layout).collect();
        assert_eq!(layouts, vec![Layout::Title, Layout::Content, Layout::Question]);
        assert_eq!(specs[1].duration_ms, Some(10_000));
        assert_eq!(specs[0].duration_ms, None);
        assert_eq!(specs[1].body.bullets().len(), 2);
        assert_eq!(specs[2].body.heading(), "Questions?");
        assert_eq!(specs[0].palette, Theme::Light.palette());
    }
}
