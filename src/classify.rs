//! Geometric shape-role classification.

use crate::slide::{
    Shape, ShapeKind, PH_BODY, PH_CENTER_TITLE, PH_OBJECT, PH_PICTURE, PH_SUBTITLE, PH_TABLE,
    PH_TITLE,
};

/// Shape position relative to the slide, each component in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeBox {
    pub fn of(shape: &Shape, slide: (i64, i64)) -> Self {
        let g = shape.geometry_or_default();
        let (w, h) = (slide.0.max(1) as f64, slide.1.max(1) as f64);
        Self {
            left: g.x as f64 / w,
            top: g.y as f64 / h,
            width: g.cx as f64 / w,
            height: g.cy as f64 / h,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Title,
    Subtitle,
    Content,
    Other,
}

/// Role of a text-bearing shape from its placeholder type, else its geometry.
pub fn text_role(shape: &Shape, slide: (i64, i64)) -> Role {
    let rel = RelativeBox::of(shape, slide);
    match shape.placeholder_code() {
        Some(PH_TITLE) | Some(PH_CENTER_TITLE) => return Role::Title,
        Some(PH_BODY) => {
            return if rel.top < 0.3 {
                Role::Subtitle
            } else {
                Role::Content
            }
        }
        Some(PH_SUBTITLE) => return Role::Subtitle,
        Some(code) if (5..=PH_OBJECT).contains(&code) => return Role::Content,
        _ => {}
    }
    if rel.top < 0.2 && rel.width > 0.5 {
        Role::Title
    } else if rel.top < 0.3 && rel.width > 0.4 {
        Role::Subtitle
    } else if rel.width > 0.4 && rel.height > 0.3 {
        Role::Content
    } else {
        Role::Other
    }
}

/// Small or edge-hugging pictures are treated as decoration that may be swapped.
pub fn is_decorative_picture(shape: &Shape, slide: (i64, i64)) -> bool {
    let rel = RelativeBox::of(shape, slide);
    rel.width < 0.3
        || rel.height < 0.3
        || rel.left < 0.1
        || rel.left > 0.9
        || rel.top < 0.1
        || rel.top > 0.9
}

/// Shape indices grouped by role; every list is sorted by area, largest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub text: Vec<usize>,
    pub title: Vec<usize>,
    pub subtitle: Vec<usize>,
    pub content: Vec<usize>,
    pub other: Vec<usize>,
    pub pictures: Vec<usize>,
    pub decorative_pictures: Vec<usize>,
    pub image_placeholders: Vec<usize>,
    pub table_placeholders: Vec<usize>,
}

pub fn classify_shapes(shapes: &[Shape], slide: (i64, i64)) -> Classification {
    let mut c = Classification::default();
    for (i, shape) in shapes.iter().enumerate() {
        match shape.placeholder_code() {
            Some(PH_PICTURE) => {
                c.image_placeholders.push(i);
                continue;
            }
            Some(PH_TABLE) => {
                c.table_placeholders.push(i);
                continue;
            }
            _ => {}
        }
        if shape.kind == ShapeKind::Picture {
            c.pictures.push(i);
            if is_decorative_picture(shape, slide) {
                c.decorative_pictures.push(i);
            }
            continue;
        }
        if !shape.has_text_frame {
            continue;
        }
        c.text.push(i);
        match text_role(shape, slide) {
            Role::Title => c.title.push(i),
            Role::Subtitle => c.subtitle.push(i),
            Role::Content => c.content.push(i),
            Role::Other => c.other.push(i),
        }
    }
    let by_area = |list: &mut Vec<usize>| {
        list.sort_by(|a, b| shapes[*b].area().cmp(&shapes[*a].area()));
    };
    by_area(&mut c.title);
    by_area(&mut c.subtitle);
    by_area(&mut c.content);
    by_area(&mut c.other);
    by_area(&mut c.pictures);
    c
}
