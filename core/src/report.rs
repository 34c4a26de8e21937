// Report rendering
//
// Turns the registry into rows for the dashboard and the CLI: service rows with the
// secure flag and related-count badge, and related-item rows with item links,
// owner contact links and formatted views/dates.

use std::fmt::Write as _;

use serde::Serialize;

use crate::directory::{OrgDirectory, OwnerOptions};
use crate::filter::{FilterState, FilteredServices, ServiceFilter};
use crate::portal::{Access, OrgUser, PortalItem, PortalUser};
use crate::registry::{filter_and_sort, Badge, ServiceRegistry, ServiceUrlInfo};

/// Shared inputs for rendering related items
pub struct ReportContext<'a> {
    /// Portal base used for item page links
    pub home_url: String,
    pub directory: &'a OrgDirectory,
    /// Signed-in user, used as cc and signature of owner emails
    pub user: Option<&'a PortalUser>,
    pub warning_threshold: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceRow {
    pub url: String,
    pub origin: String,
    pub secure: bool,
    pub related_count: usize,
    pub badge: Badge,
    pub access: Access,
    pub owner: String,
}

impl ServiceRow {
    pub fn from_info(info: &ServiceUrlInfo, warning_threshold: usize) -> Self {
        Self {
            url: info.url.clone(),
            origin: info.origin.clone(),
            secure: info.secure,
            related_count: info.related_count(),
            badge: info.badge(warning_threshold),
            access: info.access,
            owner: info.owner.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RelatedItemRow {
    pub id: String,
    pub title: String,
    pub item_type: String,
    pub item_url: String,
    pub icon_url: Option<String>,
    pub owner: String,
    /// Present when the owner is an org user with an email address
    pub owner_mailto: Option<String>,
    pub access: Access,
    pub num_views: u64,
    pub views: String,
    pub modified: String,
}

/// Service rows plus the count label, as served to clients
#[derive(Clone, Debug, Serialize)]
pub struct ServicesReport {
    pub filter: ServiceFilter,
    pub label: String,
    pub rows: Vec<ServiceRow>,
}

impl ServicesReport {
    pub fn new(filter: &ServiceFilter, view: &FilteredServices<'_>, warning_threshold: usize) -> Self {
        Self {
            filter: filter.clone(),
            label: view.count_label(),
            rows: service_rows(view, warning_threshold),
        }
    }
}

pub fn service_rows(view: &FilteredServices<'_>, warning_threshold: usize) -> Vec<ServiceRow> {
    view.rows
        .iter()
        .map(|info| ServiceRow::from_info(info, warning_threshold))
        .collect()
}

/// Related items of a service that pass the filter, in display order
pub fn related_rows(
    info: &ServiceUrlInfo,
    filter: &ServiceFilter,
    ctx: &ReportContext<'_>,
) -> Vec<RelatedItemRow> {
    filter_and_sort(info, filter)
        .into_iter()
        .map(|item| {
            let item_url = item.page_url(&ctx.home_url);
            let owner_mailto = ctx
                .directory
                .find(&item.owner)
                .filter(|owner| !owner.email.is_empty())
                .map(|owner| owner_mailto(&owner, ctx.user, item, &info.url, &item_url));
            RelatedItemRow {
                id: item.id.clone(),
                title: item.title.clone(),
                item_type: item.item_type.clone(),
                item_url,
                icon_url: item.icon_url.clone(),
                owner: item.owner.clone(),
                owner_mailto,
                access: item.access,
                num_views: item.num_views,
                views: format_thousands(item.num_views),
                modified: format_modified(item),
            }
        })
        .collect()
}

/// mailto link asking an item owner for help with an item
pub fn owner_mailto(
    owner: &OrgUser,
    sender: Option<&PortalUser>,
    item: &PortalItem,
    service_url: &str,
    item_url: &str,
) -> String {
    let first_name = owner.first_name();
    let subject = format!("'{}' - {}", item.title, item.id);
    let signature = sender.map(|s| s.full_name.as_str()).unwrap_or_default();
    let body = format!(
        "{},\n\tI need your assistance with the following item:\n\nTITLE:\t{}\nTYPE:\t{}\nID:\t{}\nLINK:\t{}\n\nCONTEXT: {}\n\nThank you,\n\n{}",
        first_name, item.title, item.item_type, item.id, item_url, service_url, signature
    );

    let mut link = format!("mailto:{}?", owner.email);
    if let Some(sender) = sender.filter(|s| !s.email.is_empty()) {
        let _ = write!(link, "cc={}&", sender.email);
    }
    let _ = write!(
        link,
        "subject={}&body={}",
        urlencoding::encode(&subject),
        urlencoding::encode(&body)
    );
    link
}

/// 1234567 -> "1,234,567"
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Modification date as "March 05, 2018"
pub fn format_modified(item: &PortalItem) -> String {
    item.modified_at()
        .map(|dt| dt.format("%B %d, %Y").to_string())
        .unwrap_or_default()
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Plain-text service table for the terminal
pub fn render_services_text(report: &ServicesReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Services: {}", report.label);
    for row in &report.rows {
        let flag = if row.secure { " " } else { "!" };
        let _ = writeln!(
            out,
            "{}{:>6} {:<8} {:<20} {}",
            flag,
            row.related_count,
            row.access.as_str(),
            truncate(&row.owner, 20),
            row.url
        );
        if row.badge == Badge::Warning {
            let _ = writeln!(out, "        ^ heavily used service");
        }
    }
    out
}

/// Plain-text related-items table for the terminal
pub fn render_related_text(service_url: &str, rows: &[RelatedItemRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Related items of {} ({})", service_url, rows.len());
    for row in rows {
        let _ = writeln!(
            out,
            "  {:<40} {:<26} {:<16} {:<8} {:>10}  {}",
            truncate(&row.title, 40),
            truncate(&row.item_type, 26),
            truncate(&row.owner, 16),
            row.access.as_str(),
            row.views,
            row.modified
        );
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
    t.push('…');
    t
}

/// Options offered by the page's owner and server selects
#[derive(Clone, Debug, Default)]
pub struct FilterChoices {
    pub owners: OwnerOptions,
    pub servers: Vec<String>,
}

impl FilterChoices {
    pub fn new(registry: &ServiceRegistry, directory: &OrgDirectory) -> Self {
        Self {
            owners: directory.owner_options(registry.owners()),
            servers: registry
                .servers()
                .into_iter()
                .map(|(origin, _)| origin.to_string())
                .collect(),
        }
    }
}

fn push_option(html: &mut String, value: &str, text: &str, selected: bool) {
    let _ = write!(
        html,
        "<option value=\"{}\"{}>{}</option>",
        escape_html(value),
        if selected { " selected" } else { "" },
        escape_html(text)
    );
}

// One form per select so that only one filter is ever submitted
fn render_filter_controls(html: &mut String, active: &ServiceFilter, choices: &FilterChoices) {
    html.push_str("<div id=\"filters\">");

    html.push_str("<form method=\"get\" action=\"/\"><select name=\"access\" onchange=\"this.form.submit()\">");
    push_option(html, "", "All access levels", false);
    for access in Access::ALL {
        let selected = *active == ServiceFilter::ByAccess(access);
        push_option(html, access.as_str(), access.as_str(), selected);
    }
    html.push_str("</select></form>");

    html.push_str("<form method=\"get\" action=\"/\"><select name=\"owner\" onchange=\"this.form.submit()\">");
    push_option(html, "", "All owners", false);
    let owners = &choices.owners;
    if !owners.in_org.is_empty() {
        let label = if owners.organization.is_empty() {
            "Organization"
        } else {
            owners.organization.as_str()
        };
        let _ = write!(html, "<optgroup label=\"{}\">", escape_html(label));
        for user in &owners.in_org {
            let selected = matches!(active, ServiceFilter::ByOwner(o) if *o == user.username);
            let text = if user.full_name.is_empty() {
                user.username.as_str()
            } else {
                user.full_name.as_str()
            };
            push_option(html, &user.username, text, selected);
        }
        html.push_str("</optgroup>");
    }
    if !owners.outside.is_empty() {
        html.push_str("<optgroup label=\"Outside the organization\">");
        for owner in &owners.outside {
            let selected = matches!(active, ServiceFilter::ByOwner(o) if o == owner);
            push_option(html, owner, owner, selected);
        }
        html.push_str("</optgroup>");
    }
    html.push_str("</select></form>");

    html.push_str("<form method=\"get\" action=\"/\"><select name=\"server\" onchange=\"this.form.submit()\">");
    push_option(html, "", "All servers", false);
    for origin in &choices.servers {
        let selected = matches!(active, ServiceFilter::ByServer(s) if s == origin);
        push_option(html, origin, origin, selected);
    }
    html.push_str("</select></form>");

    html.push_str("<a id=\"clear-filters\" href=\"/\">Clear filters</a></div>");
}

/// Self-contained HTML page with the filter controls, the service table and,
/// when a service is selected, its related items
pub fn render_html_page(
    title: &str,
    report: &ServicesReport,
    state: &FilterState,
    choices: &FilterChoices,
    related: Option<&[RelatedItemRow]>,
) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{t}</title>\
         <style>body{{font-family:sans-serif;margin:1.5em}}table{{border-collapse:collapse;width:100%}}\
         td,th{{border-bottom:1px solid #ddd;padding:4px 8px;text-align:left}}\
         .insecure{{color:#c00}}.label{{padding:0 6px;border-radius:3px;background:#eee}}\
         .label-blue{{background:#cde}}.label-red{{background:#f99}}.selected{{background:#ffd}}</style>\
         </head><body><h1>{t}</h1>",
        t = escape_html(title)
    );
    render_filter_controls(&mut html, state.active(), choices);

    let _ = write!(
        html,
        "<p id=\"items-count\">Services: {}</p><table id=\"items-node\"><thead><tr><th>Service URL</th><th>Related</th></tr></thead><tbody>",
        escape_html(&report.label)
    );
    let selected_url = state.selected_service();
    for row in &report.rows {
        let class = if selected_url == Some(row.url.as_str()) {
            "service-node selected"
        } else {
            "service-node"
        };
        let badge_class = match (row.related_count, row.badge) {
            (_, Badge::Warning) => "label label-red",
            (1, Badge::Info) => "label",
            (_, Badge::Info) => "label label-blue",
        };
        let insecure = if row.secure {
            ""
        } else {
            " <span class=\"insecure\" title=\"Using a non-secure protocol\">&#9888;</span>"
        };
        let _ = write!(
            html,
            "<tr class=\"{class}\"><td><a href=\"{link}\">{u}</a>{insecure}</td><td><mark class=\"{badge_class}\">{n}</mark></td></tr>",
            link = escape_html(&state.service_link(&row.url)),
            u = escape_html(&row.url),
            n = row.related_count
        );
    }
    html.push_str("</tbody></table>");

    if let (Some(url), Some(rows)) = (selected_url, related) {
        let _ = write!(
            html,
            "<h2>Related items of {}</h2><table id=\"related-node\"><thead><tr><th>Title</th><th>Type</th><th>Owner</th><th>Access</th><th>Views</th><th>Updated</th></tr></thead><tbody>",
            escape_html(url)
        );
        for row in rows {
            let icon = row
                .icon_url
                .as_deref()
                .map(|src| format!("<img src=\"{}\"> ", escape_html(src)))
                .unwrap_or_default();
            let contact = row
                .owner_mailto
                .as_deref()
                .map(|m| {
                    format!(
                        " <a href=\"{}\" title=\"Email owner about this item...\">&#9993;</a>",
                        escape_html(m)
                    )
                })
                .unwrap_or_default();
            let _ = write!(
                html,
                "<tr class=\"item-node\"><td>{title}</td><td>{icon}<a href=\"{link}\" target=\"_blank\">{ty}</a></td><td>{owner}{contact}</td><td>{access}</td><td>{views}</td><td>{modified}</td></tr>",
                title = escape_html(&row.title),
                link = escape_html(&row.item_url),
                ty = escape_html(&row.item_type),
                owner = escape_html(&row.owner),
                access = row.access.as_str(),
                views = row.views,
                modified = escape_html(&row.modified),
            );
        }
        html.push_str("</tbody></table>");
    }

    html.push_str("</body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1_000), "1,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
