// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::*;

const PAGE: &str = r#"
    <html>
        <head><title>Riverside Dental</title></head>
        <body>
            <h1 id="main-title">  Riverside
                Dental  </h1>
            <div class="content">
                <p class="lead">Family dentistry since 1998</p>
                <p>Open weekdays</p>
            </div>
            <ul class="services">
                <li>Cleaning</li>
                <li>Whitening</li>
                <li>Implants</li>
            </ul>
            <a class="more" href="/about">About us</a>
            <div class="price-box"><span>$120</span></div>
        </body>
    </html>
"#;

fn selectors(entries: &[(&str, Selector)]) -> SelectorMap {
    entries
        .iter()
        .map(|(name, sel)| (name.to_string(), sel.clone()))
        .collect()
}

fn text(value: &str) -> Option<FieldValue> {
    Some(FieldValue::Text(value.to_string()))
}

#[test]
fn test_extraction_service_basic_selectors() {
    let map = selectors(&[
        ("title", Selector::css("h1#main-title")),
        ("paragraphs", Selector::css("div.content p").all()),
        ("link_href", Selector::attribute("a.more", "href")),
    ]);

    let fields = ExtractionService::extract(PAGE, &map);

    assert_eq!(fields["title"], text("Riverside Dental"));
    assert_eq!(
        fields["paragraphs"],
        Some(FieldValue::List(vec![
            "Family dentistry since 1998".to_string(),
            "Open weekdays".to_string()
        ]))
    );
    assert_eq!(fields["link_href"], text("/about"));
}

#[test]
fn test_unmatched_selector_yields_null_field() {
    let map = selectors(&[
        ("title", Selector::css("h1")),
        ("phone", Selector::css(".phone")),
        ("logo", Selector::attribute("img.logo", "src")),
        ("missing_attr", Selector::attribute("a.more", "data-id")),
    ]);

    let fields = ExtractionService::extract(PAGE, &map);

    assert_eq!(fields.len(), 4);
    assert!(fields["title"].is_some());
    assert_eq!(fields["phone"], None);
    assert_eq!(fields["logo"], None);
    assert_eq!(fields["missing_attr"], None);
}

#[test]
fn test_malformed_selector_does_not_abort_other_fields() {
    let map = selectors(&[
        ("broken", Selector::css("div[")),
        ("broken_xpath", Selector::xpath("count(//li)")),
        ("title", Selector::css("title")),
    ]);

    let fields = ExtractionService::extract(PAGE, &map);

    assert_eq!(fields["broken"], None);
    assert_eq!(fields["broken_xpath"], None);
    assert_eq!(fields["title"], text("Riverside Dental"));
}

#[test]
fn test_xpath_selectors() {
    let map = selectors(&[
        ("heading", Selector::xpath("//h1/text()")),
        ("about", Selector::xpath("//a[@class='more']/@href")),
        ("second_service", Selector::xpath("//ul[@class='services']/li[2]")),
        ("last_service", Selector::xpath("//ul/li[last()]")),
        ("price", Selector::xpath("//div[contains(@class,'price')]/span")),
        ("services", Selector::xpath("/html/body/ul/li").all()),
    ]);

    let fields = ExtractionService::extract(PAGE, &map);

    assert_eq!(fields["heading"], text("Riverside Dental"));
    assert_eq!(fields["about"], text("/about"));
    assert_eq!(fields["second_service"], text("Whitening"));
    assert_eq!(fields["last_service"], text("Implants"));
    assert_eq!(fields["price"], text("$120"));
    assert_eq!(
        fields["services"],
        Some(FieldValue::List(vec![
            "Cleaning".to_string(),
            "Whitening".to_string(),
            "Implants".to_string()
        ]))
    );
}

#[test]
fn test_xpath_translation() {
    let q = xpath_to_css("//div[@id='main']//a[@href]/@href").unwrap();
    assert_eq!(q.css, r#"div[id="main"] a[href]"#);
    assert_eq!(q.attribute.as_deref(), Some("href"));

    let q = xpath_to_css("/html/body/*[1]").unwrap();
    assert_eq!(q.css, "html > body > *:nth-child(1)");
    assert_eq!(q.attribute, None);

    let q = xpath_to_css("//a[contains(@href, '/team/')]").unwrap();
    assert_eq!(q.css, r#"a[href*="/team/"]"#);

    assert!(xpath_to_css("h1").is_none());
    assert!(xpath_to_css("//li[position()>2]").is_none());
    assert!(xpath_to_css("//li[0]").is_none());
    assert!(xpath_to_css("//div[@class='open").is_none());
}

#[test]
fn test_empty_selector_map_returns_empty_fields() {
    let fields = ExtractionService::extract(PAGE, &SelectorMap::new());
    assert!(fields.is_empty());
}
