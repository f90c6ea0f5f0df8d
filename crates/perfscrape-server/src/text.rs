//! Prometheus text exposition of scrape records.

use std::collections::HashMap;

use perfscrape_core::{MetricKind, MetricRecord};
use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};

/// `Content-Type` for [`encode_text`] output.
pub fn text_content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

/// Group records into metric families.
///
/// Records sharing a name form one family. Families keep the order their
/// first record appears in; the first record of a family decides its help
/// and type.
pub fn metric_families(records: &[MetricRecord]) -> Vec<MetricFamily> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut families: Vec<(MetricKind, MetricFamily)> = Vec::new();

    for record in records {
        let slot = *index.entry(record.name.as_str()).or_insert_with(|| {
            let mut mf = MetricFamily::default();
            mf.set_name(record.name.clone());
            mf.set_help(record.help.clone());
            mf.set_field_type(metric_type(record.kind));
            families.push((record.kind, mf));
            families.len() - 1
        });
        let (kind, family) = &mut families[slot];
        family.mut_metric().push(sample(record, *kind));
    }
    families.into_iter().map(|(_, mf)| mf).collect()
}

/// Encode records as Prometheus text.
pub fn encode_text(records: &[MetricRecord]) -> prometheus::Result<String> {
    let families = metric_families(records);
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

fn metric_type(kind: MetricKind) -> MetricType {
    match kind {
        MetricKind::Gauge => MetricType::GAUGE,
        MetricKind::Counter => MetricType::COUNTER,
    }
}

fn sample(record: &MetricRecord, kind: MetricKind) -> Metric {
    let labels: Vec<LabelPair> = record
        .labels
        .iter()
        .map(|(name, value)| {
            let mut lp = LabelPair::default();
            lp.set_name(name.clone());
            lp.set_value(value.clone());
            lp
        })
        .collect();

    let mut m = Metric::default();
    m.set_label(labels);
    match kind {
        MetricKind::Counter => {
            let mut c = Counter::default();
            c.set_value(record.value);
            m.set_counter(c);
        }
        MetricKind::Gauge => {
            let mut g = Gauge::default();
            g.set_value(record.value);
            m.set_gauge(g);
        }
    }
    m
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;

    #[test]
    fn family_header_written_once() {
        let records = vec![
            MetricRecord::counter("cpu_time_seconds_total", "CPU time.", 1.5)
                .label("core", "0")
                .label("mode", "user"),
            MetricRecord::gauge("cpu_cores", "Cores.", 2.0),
            MetricRecord::counter("cpu_time_seconds_total", "CPU time.", 3.0)
                .label("core", "1")
                .label("mode", "user"),
        ];
        let text = encode_text(&records).unwrap();
        assert_eq!(
            text,
            "# HELP cpu_time_seconds_total CPU time.\n\
             # TYPE cpu_time_seconds_total counter\n\
             cpu_time_seconds_total{core=\"0\",mode=\"user\"} 1.5\n\
             cpu_time_seconds_total{core=\"1\",mode=\"user\"} 3\n\
             # HELP cpu_cores Cores.\n\
             # TYPE cpu_cores gauge\n\
             cpu_cores 2\n"
        );
    }

    #[test]
    fn families_keep_first_appearance_order() {
        let records = vec![
            MetricRecord::gauge("b", "B.", 1.0).label("task", "x"),
            MetricRecord::gauge("a", "A.", 2.0),
            MetricRecord::gauge("b", "B.", 3.0).label("task", "y"),
        ];
        let families = metric_families(&records);
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(families[0].get_metric().len(), 2);
        assert_eq!(families[1].get_metric().len(), 1);
    }

    #[test]
    fn first_record_decides_family_type() {
        let records = vec![
            MetricRecord::counter("m", "M.", 1.0).label("k", "a"),
            MetricRecord::gauge("m", "M.", 2.0).label("k", "b"),
        ];
        let families = metric_families(&records);
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_field_type(), MetricType::COUNTER);
        let text = encode_text(&records).unwrap();
        assert!(text.contains("m{k=\"b\"} 2\n"), "{text}");
    }

    #[test]
    fn label_values_escaped() {
        let r = MetricRecord::gauge("m", "", 0.0).label("path", "C:\\dir \"x\"\nnext");
        let text = encode_text(&[r]).unwrap();
        assert!(text.contains(r#"m{path="C:\\dir \"x\"\nnext"} 0"#), "{text}");
    }

    #[test]
    fn help_newlines_escaped() {
        let text = encode_text(&[MetricRecord::gauge("m", "line one\nline two", 1.0)]).unwrap();
        assert!(text.starts_with("# HELP m line one\\nline two\n"), "{text}");
    }

    #[test]
    fn empty_input() {
        assert_eq!(encode_text(&[]).unwrap(), "");
    }

    #[test]
    fn content_type_is_text_format() {
        assert!(text_content_type().starts_with("text/plain; version=0.0.4"));
    }
}
