use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use time::macros::format_description;
use time::Date;
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static LOG_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"log(\d{8})").expect("static pattern"));

/// Yearly listing page of daily log archives.
pub fn index_url(year: i32) -> String {
    format!("https://www.sec.gov/files/edgar{year}.html")
}

/// `logYYYYMMDD.zip`
pub fn archive_name(date: Date) -> String {
    format!("log{}.zip", compact(date))
}

pub fn compact(date: Date) -> String {
    format!("{:04}{:02}{:02}", date.year(), u8::from(date.month()), date.day())
}

/// Date encoded in a log archive file name, e.g. `.../log20170630.zip`.
pub fn date_from_link(link: &str) -> Option<Date> {
    let file = link.rsplit('/').next()?;
    let digits = LOG_DATE.captures(file)?.get(1)?.as_str();
    Date::parse(digits, format_description!("[year][month][day]")).ok()
}

/// Collect `.zip` links from an index page, keyed by the date in their name.
/// Relative links are resolved against `page_url`. Links without a
/// recognizable date are ignored; on duplicate dates the last link wins.
pub fn discover_log_links(html: &str, page_url: &str) -> BTreeMap<Date, String> {
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);
    let mut links = BTreeMap::new();
    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else { continue };
        let absolute = match (&base, Url::parse(href)) {
            (_, Ok(u)) => u,
            (Some(b), Err(_)) => match b.join(href) {
                Ok(u) => u,
                Err(_) => continue,
            },
            (None, Err(_)) => continue,
        };
        if !absolute.path().to_ascii_lowercase().ends_with(".zip") {
            continue;
        }
        if let Some(date) = date_from_link(absolute.path()) {
            links.insert(date, absolute.to_string());
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    const PAGE: &str = r#"<html><body><table>
        <tr><td><a href="https://www.sec.gov/files/edgar/log20170629.zip">log20170629.zip</a></td></tr>
        <tr><td><a href='/files/edgar/log20170630.zip'>log20170630.zip</a></td></tr>
        <tr><td><a href="/files/edgar/readme.zip">readme</a></td></tr>
        <tr><td><a href="/files/edgar/log20170701.csv">not an archive</a></td></tr>
    </table></body></html>"#;

    #[test]
    fn finds_dated_archives() {
        let links = discover_log_links(PAGE, &index_url(2017));
        assert_eq!(links.len(), 2);
        assert_eq!(links[&date!(2017 - 06 - 29)], "https://www.sec.gov/files/edgar/log20170629.zip");
        assert_eq!(links[&date!(2017 - 06 - 30)], "https://www.sec.gov/files/edgar/log20170630.zip");
        assert_eq!(links.keys().next_back(), Some(&date!(2017 - 06 - 30)));
    }

    #[test]
    fn unquoted_and_entity_encoded_hrefs() {
        let page = r#"<ul>
            <li><A HREF=/files/edgar/log20170703.zip>unquoted</A></li>
            <li><a href="/files/edgar/log20170705.zip?src=index&amp;v=2">with query</a></li>
            <li><a name="no-href">log20170706.zip</a></li>
        </ul>"#;
        let links = discover_log_links(page, &index_url(2017));
        assert_eq!(links.len(), 2);
        assert_eq!(links[&date!(2017 - 07 - 03)], "https://www.sec.gov/files/edgar/log20170703.zip");
        assert_eq!(links[&date!(2017 - 07 - 05)], "https://www.sec.gov/files/edgar/log20170705.zip?src=index&v=2");
    }

    #[test]
    fn names_and_dates() {
        assert_eq!(archive_name(date!(2003 - 02 - 14)), "log20030214.zip");
        assert_eq!(date_from_link("log20240320.zip"), Some(date!(2024 - 03 - 20)));
        assert_eq!(date_from_link("https://x/log20241340.zip"), None);
        assert_eq!(index_url(2024), "https://www.sec.gov/files/edgar2024.html");
    }
}
