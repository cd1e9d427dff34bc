//! Decides which pages make up a frame: up to two flat background pages and, while a
//! turn is in flight, the curling front/back pair. The renderer only draws what the
//! plan lists.

use crate::fold::FoldState;
use crate::layout::{BookLayout, PageContent};
use crate::turn::PageTurner;

/// A page drawn flat at a horizontal offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlatPage {
    pub display: i32,
    pub content: PageContent,
    pub offset_x: f32,
}

/// The page in flight: `front` on the grid's front face, `back` on the mirrored face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurlPair {
    pub front: PageContent,
    pub back: PageContent,
    pub fold: FoldState,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FramePlan {
    pub leading: Option<FlatPage>,
    pub following: Option<FlatPage>,
    pub curl: Option<CurlPair>,
}

pub fn plan_frame(turner: &PageTurner, layout: &BookLayout, page_width: f32) -> FramePlan {
    let leading = turner.leading();
    let curling = turner.renders_curl(layout);
    let next = turner.turning_to_next();
    let flow_rtl = turner.flow_rtl;

    let leading_idx = if curling && !next { leading - 2 } else { leading };
    let following_idx = if curling && next { leading + 3 } else { leading + 1 };

    let leading_page = (leading_idx >= 0).then(|| FlatPage {
        display: leading_idx,
        content: layout.resolve(leading_idx),
        offset_x: if flow_rtl { -page_width } else { 0.0 },
    });
    let following_page = (following_idx < layout.display_count()).then(|| FlatPage {
        display: following_idx,
        content: layout.resolve(following_idx),
        offset_x: if flow_rtl { 0.0 } else { -page_width },
    });

    let curl = curling.then(|| {
        let (front, back) = if next {
            (leading + 1, leading + 2)
        } else {
            (leading, leading - 1)
        };
        CurlPair {
            front: layout.resolve(front),
            back: layout.resolve(back),
            fold: *turner.fold(),
        }
    });

    FramePlan {
        leading: leading_page,
        following: following_page,
        curl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::PageSide;

    const W: f32 = 0.7;

    fn at(leading_page_number: i32, flow_rtl: bool, layout: &BookLayout) -> PageTurner {
        let mut t = PageTurner::new(flow_rtl, 1.0);
        t.jump_to(leading_page_number, layout);
        t
    }

    #[test]
    fn cover_shows_alone() {
        let layout = BookLayout::new(8, false);
        let plan = plan_frame(&at(1, true, &layout), &layout, W);
        assert_eq!(plan.leading, None);
        assert_eq!(
            plan.following,
            Some(FlatPage {
                display: 0,
                content: PageContent::Page(0),
                offset_x: 0.0
            })
        );
        assert!(plan.curl.is_none());
    }

    #[test]
    fn spread_offsets_follow_flow() {
        let layout = BookLayout::new(8, false);
        let rtl = plan_frame(&at(2, true, &layout), &layout, W);
        assert_eq!(rtl.leading.map(|p| (p.display, p.offset_x)), Some((1, -W)));
        assert_eq!(rtl.following.map(|p| (p.display, p.offset_x)), Some((2, 0.0)));

        let ltr = plan_frame(&at(2, false, &layout), &layout, W);
        assert_eq!(ltr.leading.map(|p| p.offset_x), Some(0.0));
        assert_eq!(ltr.following.map(|p| p.offset_x), Some(-W));
    }

    #[test]
    fn turning_next_exposes_the_spread_after() {
        let layout = BookLayout::new(8, false);
        let mut t = at(2, true, &layout);
        assert!(t.request_turn(PageSide::Right, &layout, W));
        let plan = plan_frame(&t, &layout, W);
        assert_eq!(plan.leading.map(|p| p.display), Some(1));
        assert_eq!(plan.following.map(|p| p.display), Some(4));
        let curl = plan.curl.expect("curl pair while turning");
        assert_eq!(curl.front, PageContent::Page(2));
        assert_eq!(curl.back, PageContent::Page(3));
    }

    #[test]
    fn turning_previous_exposes_the_spread_before() {
        let layout = BookLayout::new(8, false);
        let mut t = at(4, true, &layout);
        assert!(t.request_turn(PageSide::Left, &layout, W));
        let plan = plan_frame(&t, &layout, W);
        assert_eq!(plan.leading.map(|p| p.display), Some(1));
        assert_eq!(plan.following.map(|p| p.display), Some(4));
        let curl = plan.curl.expect("curl pair while turning");
        assert_eq!(curl.front, PageContent::Page(3));
        assert_eq!(curl.back, PageContent::Page(2));
    }

    #[test]
    fn turning_back_to_the_cover_hides_the_leading_page() {
        let layout = BookLayout::new(8, false);
        let mut t = at(2, true, &layout);
        assert!(t.request_turn(PageSide::Left, &layout, W));
        let plan = plan_frame(&t, &layout, W);
        assert_eq!(plan.leading, None);
        let curl = plan.curl.expect("curl pair while turning");
        assert_eq!(curl.front, PageContent::Page(1));
        assert_eq!(curl.back, PageContent::Page(0));
    }

    #[test]
    fn pad_and_overflow_pages_resolve_blank() {
        let layout = BookLayout::new(4, true);
        let plan = plan_frame(&at(2, true, &layout), &layout, W);
        assert_eq!(plan.leading.map(|p| p.content), Some(PageContent::Blank));
        assert_eq!(plan.following.map(|p| p.content), Some(PageContent::Page(1)));

        // Odd display count: the last turn lands on a blank back.
        let layout = BookLayout::new(5, false);
        let mut t = at(4, true, &layout);
        assert!(t.request_turn(PageSide::Right, &layout, W));
        let curl = plan_frame(&t, &layout, W).curl.expect("curl");
        assert_eq!(curl.front, PageContent::Page(4));
        assert_eq!(curl.back, PageContent::Blank);
    }
}
