//! Sitemap for the public pages. The route list is fixed; `lastmod` is stamped at
//! render time.

use chrono::{DateTime, SecondsFormat, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq { Daily, Weekly, Monthly, Yearly }

impl ChangeFreq {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SitemapRoute {
    pub path: &'static str,
    pub priority: f32,
    pub change_freq: ChangeFreq,
}

pub const ROUTES: &[SitemapRoute] = &[
    SitemapRoute { path: "/", priority: 1.0, change_freq: ChangeFreq::Weekly },
    SitemapRoute { path: "/booking", priority: 0.9, change_freq: ChangeFreq::Weekly },
    SitemapRoute { path: "/themes", priority: 0.8, change_freq: ChangeFreq::Monthly },
    SitemapRoute { path: "/services", priority: 0.8, change_freq: ChangeFreq::Monthly },
    SitemapRoute { path: "/gallery", priority: 0.7, change_freq: ChangeFreq::Weekly },
    SitemapRoute { path: "/reviews", priority: 0.6, change_freq: ChangeFreq::Daily },
    SitemapRoute { path: "/contact", priority: 0.5, change_freq: ChangeFreq::Yearly },
];

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;").replace('\'', "&apos;")
}

pub fn render(site_url: &str, now: DateTime<Utc>) -> String {
    let base = site_url.trim_end_matches('/');
    let lastmod = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for r in ROUTES {
        out.push_str("  <url>\n");
        out.push_str(&format!("    <loc>{}</loc>\n", xml_escape(&format!("{}{}", base, r.path))));
        out.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod));
        out.push_str(&format!("    <changefreq>{}</changefreq>\n", r.change_freq.as_str()));
        out.push_str(&format!("    <priority>{:.1}</priority>\n", r.priority));
        out.push_str("  </url>\n");
    }
    out.push_str("</urlset>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_route_is_listed_with_the_render_time() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 8, 30, 0).unwrap();
        let xml = render("https://piknikai.lt/", now);
        assert!(xml.starts_with("<?xml"));
        assert_eq!(xml.matches("<url>").count(), ROUTES.len());
        assert!(xml.contains("<loc>https://piknikai.lt/</loc>"));
        assert!(xml.contains("<loc>https://piknikai.lt/booking</loc>"));
        assert_eq!(xml.matches("<lastmod>2026-05-01T08:30:00Z</lastmod>").count(), ROUTES.len());
        assert!(xml.contains("<priority>1.0</priority>"));
    }

    #[test]
    fn admin_and_login_are_not_indexed() {
        assert!(ROUTES.iter().all(|r| !r.path.starts_with("/admin") && r.path != "/login"));
    }

    #[test]
    fn site_url_is_escaped() {
        let xml = render("https://example.com/?a=1&b=2", Utc::now());
        assert!(xml.contains("&amp;b=2"));
    }
}
