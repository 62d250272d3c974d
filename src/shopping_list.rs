use crate::{
    constants::{SHOPPING_LIST_EMPTY, SHOPPING_LIST_TITLE},
    schema::ShoppingListItem,
};

const PAGE_BREAK: char = '\u{000C}';

/// Renders the aggregated shopping list as a printable text document.
///
/// Every page starts with the title, lists at most `lines_per_page`
/// numbered ingredients and ends with a `Page n of m` footer. Pages are
/// separated by a form feed so printers start each one on a new sheet.
pub fn render_shopping_list(items: &[ShoppingListItem], lines_per_page: usize) -> String {
    let lines_per_page = lines_per_page.max(1);

    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            format!(
                "{}. {} {} {}",
                index + 1,
                item.name,
                item.total_amount,
                item.measurement_unit
            )
        })
        .collect();

    let pages: Vec<&[String]> = if lines.is_empty() {
        vec![&lines[..]]
    } else {
        lines.chunks(lines_per_page).collect()
    };
    let page_count = pages.len();

    pages
        .iter()
        .enumerate()
        .map(|(index, page)| render_page(page, index + 1, page_count))
        .collect::<Vec<String>>()
        .join(&PAGE_BREAK.to_string())
}

fn render_page(lines: &[String], number: usize, page_count: usize) -> String {
    let mut page = format!(
        "{SHOPPING_LIST_TITLE}\n{}\n\n",
        "=".repeat(SHOPPING_LIST_TITLE.chars().count())
    );

    if lines.is_empty() {
        page.push_str(SHOPPING_LIST_EMPTY);
        page.push('\n');
    }
    for line in lines {
        page.push_str(line);
        page.push('\n');
    }

    page.push_str(&format!("\nPage {number} of {page_count}\n"));
    page
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, total_amount: i64, unit: &str) -> ShoppingListItem {
        ShoppingListItem {
            name: name.to_string(),
            total_amount,
            measurement_unit: unit.to_string(),
        }
    }

    #[test]
    fn renders_numbered_lines() {
        let document = render_shopping_list(
            &[item("flour", 700, "g"), item("milk", 2, "l")],
            40,
        );

        assert!(document.starts_with("Shopping list\n=============\n\n"));
        assert!(document.contains("1. flour 700 g\n"));
        assert!(document.contains("2. milk 2 l\n"));
        assert!(document.ends_with("Page 1 of 1\n"));
        assert!(!document.contains(PAGE_BREAK));
    }

    #[test]
    fn splits_into_pages() {
        let items: Vec<ShoppingListItem> =
            (1..=5).map(|n| item(&format!("item{n}"), n, "pcs")).collect();

        let document = render_shopping_list(&items, 2);
        let pages: Vec<&str> = document.split(PAGE_BREAK).collect();

        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains("2. item2 2 pcs"));
        assert!(pages[0].ends_with("Page 1 of 3\n"));
        assert!(pages[2].contains("5. item5 5 pcs"));
        assert!(pages[2].starts_with("Shopping list"));
    }

    #[test]
    fn empty_cart_still_renders_a_page() {
        let document = render_shopping_list(&[], 40);

        assert!(document.contains(SHOPPING_LIST_EMPTY));
        assert!(document.ends_with("Page 1 of 1\n"));
    }
}
