
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use super::PageKind;

static RELEVANT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("p, table, h1, h2, h3, h4, h5, h6, ul, ol, div").expect("valid selector")
});
static MAIN_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("main, .mw-parser-output, #content, body").expect("valid selector")
});
static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("valid selector"));
static ITEM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("valid selector"));
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static NAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.name, div.mob-name").expect("valid selector"));
static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid selector"));
static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static PARAGRAPH_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid selector"));

const SKIPPED_CLASSES: [&str; 2] = ["mw-editsection", "mw-editsection-bracket"];
const SKIPPED_TAGS: [&str; 3] = ["script", "style", "noscript"];
const ICON_CLASSES: [&str; 2] = ["icon", "mob-icon"];
const NAME_CLASSES: [&str; 2] = ["name", "mob-name"];

/// Convert a page's HTML into the line-oriented corpus text format
///
/// Elements are visited in document order. Lists and paragraphs nested in a
/// table or another list are emitted by their container only.
#[inline]
pub fn extract_page_text(html: &str, page_url: &Url, kind: PageKind) -> String {
    let document = Html::parse_document(html);
    let mut parts = Vec::new();

    if kind == PageKind::CraftingRecipes {
        let intro = extract_intro_before_first_table(&document);
        if !intro.is_empty() {
            parts.push(intro);
        }
    }

    for element in document.select(&RELEVANT_SELECTOR) {
        if is_skipped(element) || is_nested_in_container(element) {
            continue;
        }

        let part = match element.value().name() {
            "div" => extract_icon_label(element),
            "table" => extract_table_text(element),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => extract_header_text(element),
            "ul" | "ol" => extract_list_text(element, page_url, kind == PageKind::Tutorials),
            "p" if kind != PageKind::CraftingRecipes => {
                Some(collect_text(element, " ")).filter(|text| !text.is_empty())
            }
            _ => None,
        };

        if let Some(part) = part {
            parts.push(part);
        }
    }

    debug!("Extracted {} text parts from {}", parts.len(), page_url);
    parts.join("\n")
}

/// Gather the stripped text nodes below an element, skipping edit links
fn collect_strings(element: ElementRef<'_>, strings: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    strings.push(trimmed.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child).filter(|e| !is_skipped(*e)) {
                    collect_strings(child_element, strings);
                }
            }
            _ => {}
        }
    }
}

fn collect_text(element: ElementRef<'_>, separator: &str) -> String {
    let mut strings = Vec::new();
    collect_strings(element, &mut strings);
    strings.join(separator)
}

fn has_class(element: ElementRef<'_>, classes: &[&str]) -> bool {
    element.value().classes().any(|class| classes.contains(&class))
}

fn is_skipped(element: ElementRef<'_>) -> bool {
    SKIPPED_TAGS.contains(&element.value().name()) || has_class(element, &SKIPPED_CLASSES)
}

fn is_nested_in_container(element: ElementRef<'_>) -> bool {
    if !matches!(element.value().name(), "p" | "ul" | "ol") {
        return false;
    }

    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| matches!(ancestor.value().name(), "table" | "ul" | "ol"))
}

/// Label of an icon container, taken from its name block, image or text
fn extract_icon_label(element: ElementRef<'_>) -> Option<String> {
    if !has_class(element, &ICON_CLASSES) {
        return None;
    }

    let sibling_name = element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "div" && has_class(*sibling, &NAME_CLASSES));

    let label = if let Some(name) = sibling_name.or_else(|| element.select(&NAME_SELECTOR).next())
    {
        collect_text(name, "")
    } else {
        element
            .select(&IMG_SELECTOR)
            .next()
            .and_then(|img| {
                img.value()
                    .attr("alt")
                    .filter(|alt| !alt.is_empty())
                    .or_else(|| img.value().attr("title"))
                    .filter(|title| !title.is_empty())
            })
            .map_or_else(|| collect_text(element, ""), str::to_string)
    };

    (!label.is_empty()).then(|| format!("IMAGE_LABEL: {label}"))
}

fn extract_table_text(element: ElementRef<'_>) -> Option<String> {
    let rows: Vec<String> = element
        .select(&ROW_SELECTOR)
        .map(|row| {
            row.select(&CELL_SELECTOR)
                .map(|cell| collect_text(cell, ""))
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .filter(|row| !row.is_empty())
        .collect();

    (!rows.is_empty()).then(|| format!("\nTABLE:\n{}\n", rows.join("\n")))
}

fn extract_header_text(element: ElementRef<'_>) -> Option<String> {
    let text = collect_text(element, "");
    (!text.is_empty()).then(|| format!("{}: {text}", element.value().name().to_uppercase()))
}

fn extract_list_text(element: ElementRef<'_>, page_url: &Url, keep_links: bool) -> Option<String> {
    let items: Vec<String> = element
        .select(&ITEM_SELECTOR)
        .filter_map(|item| {
            let link = item
                .select(&LINK_SELECTOR)
                .next()
                .filter(|_| keep_links)
                .and_then(|link| link.value().attr("href").map(|href| (link, href)));
            if let Some((link, href)) = link {
                let target = page_url
                    .join(href)
                    .map_or_else(|_| href.to_string(), |url| url.to_string());
                return Some(format!("- [{}]({target})", collect_text(link, " ")));
            }

            let text = collect_text(item, " ");
            (!text.is_empty()).then(|| format!("- {text}"))
        })
        .collect();

    (!items.is_empty()).then(|| items.join("\n"))
}

/// Text of the paragraphs and divs preceding the first table of the main
/// container, or of every paragraph when the page has no table
fn extract_intro_before_first_table(document: &Html) -> String {
    let Some(main) = document.select(&MAIN_SELECTOR).next() else {
        return String::new();
    };

    let parts: Vec<String> = if main.select(&TABLE_SELECTOR).next().is_none() {
        main.select(&PARAGRAPH_SELECTOR)
            .map(|p| collect_text(p, " "))
            .filter(|text| !text.is_empty())
            .collect()
    } else {
        main.children()
            .filter_map(ElementRef::wrap)
            .take_while(|child| child.value().name() != "table")
            .filter(|child| matches!(child.value().name(), "p" | "div"))
            .map(|child| collect_text(child, " "))
            .filter(|text| !text.is_empty())
            .collect()
    };

    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
