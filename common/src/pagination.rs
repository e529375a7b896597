//! Abstractions for page-number pagination.

use std::{collections::BTreeSet, num::NonZeroUsize};

use url::form_urlencoded;

/// Name of the query parameter carrying the page number.
pub const PAGE_PARAM: &str = "page";

/// Name of the cache-busting query parameter, never propagated into links.
const CACHE_BUSTER_PARAM: &str = "_";

/// Parses a page number out of the raw `page` query parameter.
///
/// Leading decimal digits are taken (so `"2abc"` is page `2`); anything else,
/// including `0` and a missing value, is page `1`.
#[must_use]
pub fn page_number(raw: Option<&str>) -> NonZeroUsize {
    raw.map(str::trim)
        .map(|s| {
            let digits = s.bytes().take_while(u8::is_ascii_digit).count();
            &s[..digits]
        })
        .and_then(|s| s.parse::<NonZeroUsize>().ok())
        .unwrap_or(NonZeroUsize::MIN)
}

/// Returns the number of pages needed to show `count` items by `page_size`.
///
/// There is always at least one page, even for no items at all.
#[must_use]
pub fn page_count(count: usize, page_size: NonZeroUsize) -> usize {
    count.div_ceil(page_size.get()).max(1)
}

/// Ordered query string parameters of a paginated request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    /// Creates a new [`Query`] out of the provided key-value pairs, keeping
    /// their order.
    #[must_use]
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Parses a [`Query`] from a raw `application/x-www-form-urlencoded`
    /// string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self(form_urlencoded::parse(raw.as_bytes()).into_owned().collect())
    }

    /// Returns the first value of the `key` parameter, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }

    /// Serializes this [`Query`] pointing to the provided `page`.
    ///
    /// The `page` parameter keeps its position if present, otherwise it's
    /// appended. All other parameters are preserved as is.
    #[must_use]
    pub fn with_page(&self, page: usize) -> String {
        let page = page.to_string();
        let mut ser = form_urlencoded::Serializer::new(String::new());
        let mut has_page = false;
        for (k, v) in &self.0 {
            if k == CACHE_BUSTER_PARAM {
                continue;
            }
            if k == PAGE_PARAM {
                if !has_page {
                    _ = ser.append_pair(k, &page);
                    has_page = true;
                }
            } else {
                _ = ser.append_pair(k, v);
            }
        }
        if !has_page {
            _ = ser.append_pair(PAGE_PARAM, &page);
        }
        ser.finish()
    }
}

/// Link to a single page.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub struct PageLink {
    /// Number of the linked page.
    pub page: usize,

    /// Indicator whether this link is applicable (or current, for the page
    /// list).
    pub active: bool,

    /// Query string leading to the linked page.
    pub qs: String,
}

/// Item of a page list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Item {
    /// Link to a page.
    Page(PageLink),

    /// Gap of more than one page between two links.
    Separator,
}

/// Relation link (`rel="next"`/`rel="prev"`).
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub struct Rel {
    /// Relation name.
    pub rel: &'static str,

    /// Relative URL of the related page.
    pub href: String,
}

/// Page-number pagination metadata.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current page number.
    pub current_page: usize,

    /// Total number of pages.
    pub page_count: usize,

    /// List of page links to show.
    pub pages: Vec<Item>,

    /// Link to the previous page.
    pub prev: PageLink,

    /// Link to the next page.
    pub next: PageLink,

    /// Link to the first page.
    pub first: PageLink,

    /// Link to the last page.
    pub last: PageLink,

    /// Indicator whether there is a page before the current one.
    pub has_prev: bool,

    /// Indicator whether there is a page after the current one.
    pub has_next: bool,

    /// Relation links of the current page.
    pub rel: Vec<Rel>,
}

impl Pagination {
    /// Number of consecutive pages shown around the current one.
    const WINDOW: usize = 5;

    /// Builds [`Pagination`] for the `current` page out of `page_count`,
    /// linking pages with the provided [`Query`].
    #[must_use]
    pub fn new(current: usize, page_count: usize, query: &Query) -> Self {
        let current = current.max(1);

        if page_count <= 1 {
            let single = |active| PageLink {
                page: 1,
                active,
                qs: query.with_page(1),
            };
            return Self {
                current_page: 1,
                page_count: 1,
                pages: vec![],
                prev: single(current > 1),
                next: single(false),
                first: single(current == 1),
                last: single(current == 1),
                has_prev: false,
                has_next: false,
                rel: vec![],
            };
        }

        let previous = current.saturating_sub(1).max(1);
        let next = current.saturating_add(1).min(page_count);

        let mut start = current.saturating_sub(2).max(1);
        if start.saturating_add(Self::WINDOW) > page_count {
            start = (page_count + 1)
                .saturating_sub(Self::WINDOW)
                .max(1)
                .min(start);
        }
        let shown = [1, 2, page_count - 1, page_count]
            .into_iter()
            .chain((0..Self::WINDOW).map(|i| start.saturating_add(i)))
            .filter(|p| (1..=page_count).contains(p))
            .collect::<BTreeSet<_>>();

        let link = |page| PageLink {
            page,
            active: page == current,
            qs: query.with_page(page),
        };
        let mut pages = Vec::with_capacity(shown.len() + 2);
        let mut prev_shown = None::<usize>;
        for page in shown {
            match prev_shown {
                Some(p) if page - p == 2 => {
                    pages.push(Item::Page(link(p + 1)));
                }
                Some(p) if page - p > 2 => pages.push(Item::Separator),
                Some(_) | None => {}
            }
            pages.push(Item::Page(link(page)));
            prev_shown = Some(page);
        }

        let mut rel = Vec::with_capacity(2);
        if current < page_count {
            rel.push(Rel {
                rel: "next",
                href: format!("?{}", query.with_page(next)),
            });
        }
        if current > 1 {
            rel.push(Rel {
                rel: "prev",
                href: format!("?{}", query.with_page(previous)),
            });
        }

        Self {
            current_page: current,
            page_count,
            pages,
            prev: PageLink {
                page: previous,
                active: current > 1,
                qs: query.with_page(previous),
            },
            next: PageLink {
                page: next,
                active: current < page_count,
                qs: query.with_page(next),
            },
            first: PageLink {
                page: 1,
                active: current == 1,
                qs: query.with_page(1),
            },
            last: PageLink {
                page: page_count,
                active: current == page_count,
                qs: query.with_page(page_count),
            },
            has_prev: current > 1,
            has_next: current < page_count,
            rel,
        }
    }
}

impl serde::Serialize for Item {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct as _;

        match self {
            Self::Page(link) => serde::Serialize::serialize(link, serializer),
            Self::Separator => {
                let mut s = serializer.serialize_struct("Separator", 1)?;
                s.serialize_field("separator", &true)?;
                s.end()
            }
        }
    }
}

#[cfg(test)]
mod spec {
    use std::num::NonZeroUsize;

    use super::{page_count, page_number, Item, Pagination, Query};

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn page_numbers(p: &Pagination) -> Vec<usize> {
        p.pages
            .iter()
            .filter_map(|i| match i {
                Item::Page(l) => Some(l.page),
                Item::Separator => None,
            })
            .collect()
    }

    #[test]
    fn parses_page_number() {
        assert_eq!(page_number(None).get(), 1);
        assert_eq!(page_number(Some("")).get(), 1);
        assert_eq!(page_number(Some("abc")).get(), 1);
        assert_eq!(page_number(Some("0")).get(), 1);
        assert_eq!(page_number(Some("-3")).get(), 1);
        assert_eq!(page_number(Some("3")).get(), 3);
        assert_eq!(page_number(Some("2abc")).get(), 2);
        assert_eq!(
            page_number(Some(&usize::MAX.to_string())).get(),
            usize::MAX,
        );
        assert_eq!(page_number(Some("99999999999999999999999")).get(), 1);
    }

    #[test]
    fn counts_pages() {
        assert_eq!(page_count(0, size(20)), 1);
        assert_eq!(page_count(1, size(20)), 1);
        assert_eq!(page_count(20, size(20)), 1);
        assert_eq!(page_count(21, size(20)), 2);
        assert_eq!(page_count(45, size(20)), 3);
    }

    #[test]
    fn single_page_has_no_links() {
        let p = Pagination::new(1, page_count(0, size(20)), &Query::default());

        assert_eq!(p.page_count, 1);
        assert_eq!(p.current_page, 1);
        assert!(p.pages.is_empty());
        assert!(!p.has_prev);
        assert!(!p.has_next);
        assert!(p.rel.is_empty());
    }

    #[test]
    fn links_window_around_current_page() {
        let p = Pagination::new(10, 20, &Query::default());

        assert_eq!(
            page_numbers(&p),
            [1, 2, 8, 9, 10, 11, 12, 19, 20],
        );
        assert_eq!(
            p.pages
                .iter()
                .filter(|i| matches!(i, Item::Separator))
                .count(),
            2,
        );
        assert!(p.has_prev);
        assert!(p.has_next);
        assert_eq!(p.prev.page, 9);
        assert_eq!(p.next.page, 11);
    }

    #[test]
    fn fills_single_page_gaps() {
        let p = Pagination::new(5, 10, &Query::default());

        assert_eq!(
            page_numbers(&p),
            [1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
        );
        assert!(!p.pages.iter().any(|i| matches!(i, Item::Separator)));
    }

    #[test]
    fn shifts_window_near_the_end() {
        let p = Pagination::new(20, 20, &Query::default());

        assert_eq!(
            page_numbers(&p),
            [1, 2, 16, 17, 18, 19, 20],
        );
        assert!(!p.has_next);
        assert_eq!(p.rel.len(), 1);
        assert_eq!(p.rel[0].rel, "prev");
    }

    #[test]
    fn tolerates_out_of_range_pages() {
        let p = Pagination::new(usize::MAX, 3, &Query::default());

        assert_eq!(p.current_page, usize::MAX);
        assert_eq!(page_numbers(&p), [1, 2, 3]);
        assert!(p.has_prev);
        assert!(!p.has_next);
        assert_eq!(p.next.page, 3);

        let p = Pagination::new(usize::MAX, usize::MAX, &Query::default());

        assert!(!p.has_next);
        assert_eq!(p.next.page, usize::MAX);
        assert_eq!(page_numbers(&p).last(), Some(&usize::MAX));
    }

    #[test]
    fn preserves_other_query_params() {
        let query = Query::parse("section=online&page=2&_=123&term=a+b");
        let p = Pagination::new(2, 3, &query);

        assert_eq!(p.next.qs, "section=online&page=3&term=a+b");
        assert_eq!(p.first.qs, "section=online&page=1&term=a+b");
        assert_eq!(p.rel[0].href, "?section=online&page=3&term=a+b");
    }

    #[test]
    fn appends_missing_page_param() {
        let query = Query::new([("section", "sort-posts")]);

        assert_eq!(query.with_page(4), "section=sort-posts&page=4");
        assert_eq!(query.get("section"), Some("sort-posts"));
        assert_eq!(query.get("page"), None);
    }
}
