//! Post-fill cleanup of duplicated and overlapping text.

use crate::drawing::Geometry;
use crate::model::SlideContent;
use crate::slide::SlideXml;
use std::collections::HashSet;
use tracing::debug;

/// Word-set overlap of two texts, relative to the larger set.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let words = |s: &str| -> HashSet<String> {
        s.split_whitespace().map(|w| w.to_lowercase()).collect()
    };
    let (wa, wb) = (words(a), words(b));
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let common = wa.intersection(&wb).count();
    common as f64 / wa.len().max(wb.len()) as f64
}

#[derive(Debug, Clone)]
struct TextBox {
    index: usize,
    text: String,
    geom: Geometry,
    in_title_region: bool,
    right_side: bool,
}

impl TextBox {
    fn alive(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

struct Pass<'a> {
    slide: &'a mut SlideXml,
    boxes: Vec<TextBox>,
    cleared: usize,
}

impl Pass<'_> {
    fn clear(&mut self, b: usize) {
        if self.boxes[b].alive() {
            self.slide.clear_text(self.boxes[b].index);
            self.boxes[b].text.clear();
            self.cleared += 1;
        }
    }

    fn write(&mut self, b: usize, text: &str) {
        self.slide.set_text(self.boxes[b].index, text);
        self.boxes[b].text = text.to_string();
    }

    fn alive_where(&self, pred: impl Fn(&TextBox) -> bool) -> Vec<usize> {
        (0..self.boxes.len())
            .filter(|&b| self.boxes[b].alive() && pred(&self.boxes[b]))
            .collect()
    }

    fn largest(&self, candidates: &[usize]) -> Option<usize> {
        candidates
            .iter()
            .copied()
            .max_by_key(|&b| self.boxes[b].geom.area())
    }
}

/// Resolves duplicated titles/content and overlapping text after a fill.
/// Returns how many text frames were cleared.
pub fn optimize_text_layout(
    slide: &mut SlideXml,
    content: &SlideContent,
    size: (i64, i64),
) -> usize {
    let (width, height) = size;
    let boxes: Vec<TextBox> = slide
        .shapes()
        .iter()
        .enumerate()
        .filter(|(i, s)| s.has_text_frame && !slide.is_removed(*i) && s.has_text())
        .map(|(index, s)| {
            let geom = s.geometry_or_default();
            TextBox {
                index,
                text: s.text(),
                geom,
                in_title_region: geom.y < height / 4,
                right_side: geom.x > width / 2,
            }
        })
        .collect();
    if boxes.len() <= 1 {
        return 0;
    }
    let title = content.title.trim();
    let body = content.content.trim();
    let mut pass = Pass {
        slide,
        boxes,
        cleared: 0,
    };

    // Title repeated in several right-hand boxes.
    if !title.is_empty() {
        let copies = pass.alive_where(|b| b.right_side && b.text.contains(title));
        if copies.len() > 1 {
            let keep = pass.largest(&copies);
            for b in copies.into_iter().filter(|b| Some(*b) != keep) {
                pass.clear(b);
            }
        } else if copies.len() == 1
            && !body.is_empty()
            && pass.boxes[copies[0]].text.chars().count() * 2 < body.chars().count()
        {
            pass.write(copies[0], body);
        }
    }

    // Overlapping boxes that say the same thing.
    let mut order: Vec<usize> = (0..pass.boxes.len()).collect();
    order.sort_by_key(|&b| pass.boxes[b].geom.y);
    for (pos, &a) in order.iter().enumerate() {
        for &b in &order[pos + 1..] {
            if !pass.boxes[a].alive() || !pass.boxes[b].alive() {
                continue;
            }
            let (ga, gb) = (pass.boxes[a].geom, pass.boxes[b].geom);
            let overlap = ga.intersection_area(&gb);
            let smaller = ga.area().min(gb.area());
            if overlap as f64 <= 0.3 * smaller as f64 {
                continue;
            }
            if text_similarity(&pass.boxes[a].text, &pass.boxes[b].text) > 0.5 {
                let victim = if ga.area() < gb.area() { a } else { b };
                debug!(shape = pass.boxes[victim].index, "clearing overlapping duplicate");
                pass.clear(victim);
            }
        }
    }

    // Several right-hand boxes: keep one carrying the content.
    let right = pass.alive_where(|b| b.right_side);
    if right.len() > 1 {
        if let Some(mut main) = pass.largest(&right) {
            if !body.is_empty() {
                if let Some(holder) = right.iter().copied().find(|&b| pass.boxes[b].text.contains(body)) {
                    main = holder;
                }
            }
            let original = pass.boxes[main].text.clone();
            if !body.is_empty() && !original.contains(body) {
                pass.write(main, body);
            }
            for b in right.into_iter().filter(|&b| b != main) {
                if text_similarity(&pass.boxes[b].text, &original) > 0.3 {
                    pass.clear(b);
                }
            }
        }
    }

    // Title band: the topmost box owns the title.
    if !title.is_empty() {
        let mut band = pass.alive_where(|b| b.in_title_region);
        if band.len() > 1 {
            band.sort_by_key(|&b| pass.boxes[b].geom.y);
            if !pass.boxes[band[0]].text.contains(title) {
                pass.write(band[0], title);
            }
            for &b in &band[1..] {
                if text_similarity(&pass.boxes[b].text, title) > 0.5 {
                    pass.clear(b);
                }
            }
        }

        // Stray short copies of the title elsewhere on the slide.
        let limit = title.chars().count() as f64 * 1.2;
        for b in pass.alive_where(|b| !b.in_title_region) {
            let text = &pass.boxes[b].text;
            if text_similarity(text, title) > 0.7 && text.chars().count() as f64 <= limit {
                pass.clear(b);
            }
        }
    }

    pass.cleared
}
