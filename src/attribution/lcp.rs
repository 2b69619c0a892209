use std::collections::HashMap;

use serde::Serialize;
use url::Url;

use crate::entry::{LargestContentfulPaint, NavigationTiming, ResourceTiming};
use crate::metric::Metric;

use super::{describe_target, Lookups, TargetGenerator};

/// Targets captured before candidates were processed, keyed by
/// [`LargestContentfulPaint::key`].
pub type PaintTargets = HashMap<(u64, u64), Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LcpAttribution {
    pub target: Option<String>,
    pub url: Option<String>,
    pub time_to_first_byte: f64,
    pub resource_load_delay: f64,
    pub resource_load_duration: f64,
    pub element_render_delay: f64,
    pub navigation_entry: Option<NavigationTiming>,
    pub lcp_entry: Option<LargestContentfulPaint>,
    pub lcp_resource_entry: Option<ResourceTiming>,
}

fn without_fragment(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.split('#').next().unwrap_or(raw).to_string(),
    }
}

fn find_resource<'a>(resources: &'a [ResourceTiming], url: &str) -> Option<&'a ResourceTiming> {
    let wanted = without_fragment(url);
    resources.iter().find(|r| without_fragment(&r.name) == wanted)
}

/// Break the paint time into first byte, resource wait, resource load and
/// render delay.
pub fn attribute_lcp(
    metric: &Metric,
    lookups: &Lookups,
    targets: &PaintTargets,
    generate: Option<&TargetGenerator>,
) -> LcpAttribution {
    let value = metric.value.max(0.0);
    let Some(nav) = lookups.navigation.as_ref() else {
        return LcpAttribution {
            element_render_delay: value,
            ..Default::default()
        };
    };
    let activation = nav.activation_start;
    let ttfb = (nav.response_start - activation).max(0.0).min(value);

    let Some(lcp) = metric.entries.last().and_then(|e| e.as_largest_contentful_paint()) else {
        return LcpAttribution {
            time_to_first_byte: ttfb,
            element_render_delay: value - ttfb,
            navigation_entry: Some(nav.clone()),
            ..Default::default()
        };
    };

    let resource = lcp
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .and_then(|u| find_resource(&lookups.resources, u));
    let request_start = resource
        .map(|r| {
            let start = if r.request_start > 0.0 { r.request_start } else { r.start_time };
            start - activation
        })
        .unwrap_or(0.0)
        .max(ttfb)
        .min(value);
    let response_end = resource
        .map(|r| r.response_end - activation)
        .unwrap_or(0.0)
        .max(request_start)
        .min(value);

    let target = match targets.get(&lcp.key()) {
        Some(captured) => captured.clone(),
        None => describe_target(lcp.element.as_deref(), generate),
    };

    LcpAttribution {
        target,
        url: lcp.url.clone().filter(|u| !u.is_empty()),
        time_to_first_byte: ttfb,
        resource_load_delay: request_start - ttfb,
        resource_load_duration: response_end - request_start,
        element_render_delay: value - response_end,
        navigation_entry: Some(nav.clone()),
        lcp_entry: Some(lcp.clone()),
        lcp_resource_entry: resource.cloned(),
    }
}
