use crate::table::Metric;
use serde::{Deserialize, Serialize};
use url::Url;

const CSSE_TIME_SERIES: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/";

/// A remote CSV resource. `name` doubles as the raw file name prefix.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Source {
    pub name: String,
    pub metric: Metric,
    pub url: Url,
}

impl Source {
    pub fn new(name: impl Into<String>, metric: Metric, url: Url) -> Self {
        Source {
            name: name.into(),
            metric,
            url,
        }
    }
}

/// Johns Hopkins CSSE global time series for confirmed cases and deaths.
pub fn default_sources() -> Vec<Source> {
    [
        ("confirmed", Metric::Confirmed, "time_series_covid19_confirmed_global.csv"),
        ("deaths", Metric::Deaths, "time_series_covid19_deaths_global.csv"),
    ]
    .into_iter()
    .map(|(name, metric, file)| {
        let url = Url::parse(CSSE_TIME_SERIES)
            .and_then(|base| base.join(file))
            .expect("default source URL should parse");
        Source::new(name, metric, url)
    })
    .collect()
}

/// The single configured source for `metric`, if exactly one exists.
pub fn source_for(sources: &[Source], metric: Metric) -> Option<&Source> {
    let mut it = sources.iter().filter(|s| s.metric == metric);
    match (it.next(), it.next()) {
        (Some(s), None) => Some(s),
        _ => None,
    }
}
