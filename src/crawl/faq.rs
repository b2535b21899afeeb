use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use super::rules::{first_match, select_items, FieldRule};
use crate::db::FaqEntry;

static BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(.*?)\]\s*(.*)$").unwrap());

/// Where a manufacturer keeps its FAQ and how to read it.
#[derive(Debug)]
pub struct FaqSite {
    pub company: &'static str,
    pub url: &'static str,
    pub wait_marker: &'static str,
    /// Optional section container carrying a category shared by its items.
    pub group: Option<&'static str>,
    pub group_category: &'static [FieldRule],
    pub item: &'static str,
    pub category: &'static [FieldRule],
    pub question: &'static [FieldRule],
    pub answer: &'static [FieldRule],
    /// Questions look like `[category] question text`.
    pub bracket_category: bool,
}

pub static GENESIS: FaqSite = FaqSite {
    company: "GENESIS",
    url: "https://www.genesis.com/kr/ko/support/faq.html",
    wait_marker: ".cp-faq__accordion",
    group: None,
    group_category: &[],
    item: "div.cp-faq__accordion-item",
    category: &[FieldRule::text("strong.accordion-label")],
    question: &[FieldRule::text("p.accordion-title"), FieldRule::text(".accordion-title")],
    answer: &[
        FieldRule::paragraphs("div.accordion-panel-inner"),
        FieldRule::paragraphs(".accordion-panel"),
    ],
    bracket_category: false,
};

pub static INFINITI: FaqSite = FaqSite {
    company: "INFINITI",
    url: "https://www.infiniti.com/regions/ko-kr/faqs.html",
    wait_marker: ".accordion-title",
    group: Some("div.contentZone.section"),
    group_category: &[FieldRule::text("div.heliostext.section span[class]")],
    item: "div.accordion-group",
    category: &[],
    question: &[FieldRule::text("h2.accordion-title"), FieldRule::text(".accordion-title")],
    answer: &[FieldRule::paragraphs("div.accordion-panel")],
    bracket_category: false,
};

pub static CHEVROLET: FaqSite = FaqSite {
    company: "CHEVROLET",
    url: "https://www.chevrolet.co.kr/faq",
    wait_marker: ".col-con",
    group: None,
    group_category: &[],
    item: "div.q-mod.q-mod-expander.q-expander",
    category: &[],
    question: &[
        FieldRule::text("h6.q-button-text.q-headline-text"),
        FieldRule::text(".q-headline-text"),
    ],
    answer: &[
        FieldRule::paragraphs("div.q-text.q-body1.q-invert"),
        FieldRule::paragraphs(".q-text"),
    ],
    bracket_category: true,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Site {
    Genesis,
    Infiniti,
    Chevrolet,
}

impl Site {
    pub const ALL: [Site; 3] = [Site::Genesis, Site::Infiniti, Site::Chevrolet];

    pub fn rules(self) -> &'static FaqSite {
        match self {
            Site::Genesis => &GENESIS,
            Site::Infiniti => &INFINITI,
            Site::Chevrolet => &CHEVROLET,
        }
    }
}

/// Split `[category] question` into its parts.
pub fn split_bracket(question: &str) -> Option<(String, String)> {
    let caps = BRACKET_RE.captures(question)?;
    Some((caps[1].trim().to_string(), caps[2].trim().to_string()))
}

/// Pull every complete FAQ item out of a rendered page. Items without a
/// question or answer are skipped.
pub fn extract(html: &str, site: &FaqSite) -> Vec<FaqEntry> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let groups = match site.group {
        Some(css) => select_items(root, &[css]),
        None => vec![root],
    };

    let mut out = Vec::new();
    for group in groups {
        let group_category = first_match(group, site.group_category);

        for item in select_items(group, &[site.item]) {
            let Some(mut question) = first_match(item, site.question) else { continue };
            let Some(answer) = first_match(item, site.answer) else { continue };
            let mut category = first_match(item, site.category).or_else(|| group_category.clone());

            if site.bracket_category {
                if let Some((c, q)) = split_bracket(&question) {
                    category = Some(c).filter(|c| !c.is_empty()).or(category);
                    question = q;
                }
            }
            if question.is_empty() {
                continue;
            }

            out.push(FaqEntry {
                company: site.company.to_string(),
                category,
                question,
                answer,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn genesis() {
        let faqs = extract(&fixture("genesis_faq"), &GENESIS);
        assert_eq!(faqs.len(), 2);
        assert_eq!(faqs[0].company, "GENESIS");
        assert_eq!(faqs[0].category.as_deref(), Some("구매"));
        assert_eq!(faqs[0].question, "시승 신청은 어떻게 하나요?");
        assert_eq!(faqs[0].answer, "홈페이지에서 신청할 수 있습니다.\n전시장 방문도 가능합니다.");
        // The third item has no question text and is skipped.
        assert!(faqs.iter().all(|f| !f.question.is_empty()));
    }

    #[test]
    fn infiniti_group_categories() {
        let faqs = extract(&fixture("infiniti_faq"), &INFINITI);
        assert_eq!(faqs.len(), 3);
        assert_eq!(faqs[0].category.as_deref(), Some("서비스"));
        assert_eq!(faqs[1].category.as_deref(), Some("서비스"));
        assert_eq!(faqs[2].category.as_deref(), Some("보증"));
        assert_eq!(faqs[2].question, "보증 기간은 얼마인가요?");
    }

    #[test]
    fn chevrolet_bracket_categories() {
        let faqs = extract(&fixture("chevrolet_faq"), &CHEVROLET);
        assert_eq!(faqs.len(), 2);
        assert_eq!(faqs[0].category.as_deref(), Some("정비"));
        assert_eq!(faqs[0].question, "엔진오일 교환 주기는?");
        assert_eq!(faqs[1].category, None);
        assert_eq!(faqs[1].question, "고객센터 운영 시간은?");
    }

    #[test]
    fn brackets() {
        assert_eq!(
            split_bracket("[구매] 할부 가능한가요?"),
            Some(("구매".to_string(), "할부 가능한가요?".to_string()))
        );
        assert_eq!(split_bracket("할부 가능한가요?"), None);
    }

    #[test]
    fn page_without_items() {
        assert!(extract("<html><body><p>점검 중</p></body></html>", &GENESIS).is_empty());
    }
}
