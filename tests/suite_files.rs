use layoutprobe::predicate::{ImageChild, Predicate};
use layoutprobe::suite::{Filter, Suite};
use std::io::Write;

const SUITE: &str = r##"
[harness]
base_url = "http://127.0.0.1:8080/site/"
navigation_timeout_ms = 5000
concurrency = 2

[[viewports]]
name = "desktop"
width = 1440
height = 900

[[viewports]]
name = "phone"
width = 390
height = 844
dpr = 3.0
touch = true

[[pages]]
path = "home.html"

  [[pages.checks]]
  kind = "no_horizontal_overflow"

  [[pages.checks]]
  kind = "image_aspect"
  exclude = "#lightbox-img"
  min_ratio = 0.25
  max_ratio = 4

  [[pages.checks]]
  kind = "stacked_order"
  viewports = ["phone"]

[[pages]]
path = "training.html"
fragment = "ttp"
viewport = { name = "narrow", width = 360, height = 740 }

  [[pages.checks]]
  kind = "stacked_order"
  container = "#ttp .container"
  image_child = "first"
  margin = 12
"##;

#[test]
fn toml_suite_round_trips_into_cases() {
    let suite = Suite::from_toml(SUITE).expect("suite parses");
    suite.validate().expect("suite is valid");

    let harness = suite.harness.clone().expect("harness table");
    assert_eq!(harness.navigation_timeout_ms, 5000);
    assert_eq!(harness.action_timeout_ms, 15_000);
    assert_eq!(harness.concurrency, 2);

    let base = harness.validate().unwrap();
    let cases = suite.cases(&base, &Filter::default()).unwrap();
    let labels: Vec<String> = cases.iter().map(|c| c.label()).collect();
    assert_eq!(
        labels,
        vec![
            "home.html @ desktop",
            "home.html @ phone",
            "training.html#ttp @ narrow"
        ]
    );
    assert_eq!(cases[0].checks.len(), 2);
    assert_eq!(cases[1].checks.len(), 3);
    assert_eq!(
        cases[2].url.as_str(),
        "http://127.0.0.1:8080/site/training.html#ttp"
    );
    match &cases[2].checks[0] {
        Predicate::StackedOrder(s) => {
            assert_eq!(s.image_child, ImageChild::First);
            assert_eq!(s.margin, 12.0);
        }
        other => panic!("unexpected predicate {:?}", other),
    }
}

#[test]
fn viewports_default_to_presets() {
    let suite = Suite::from_toml(
        "[[pages]]\npath = \"home.html\"\n[[pages.checks]]\nkind = \"hero_visible\"\n",
    )
    .unwrap();
    assert_eq!(suite.viewports.len(), 3);
    assert!(suite.harness.is_none());
}

#[test]
fn unknown_predicate_kind_is_a_config_error() {
    let err = Suite::from_toml(
        "[[pages]]\npath = \"home.html\"\n[[pages.checks]]\nkind = \"pixel_diff\"\n",
    )
    .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn misspelled_threshold_is_rejected() {
    let err = Suite::from_toml(
        "[[pages]]\npath = \"home.html\"\n[[pages.checks]]\nkind = \"card_pairing\"\nmax_height_detla = 10\n",
    )
    .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn suite_file_loads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SUITE.as_bytes()).unwrap();
    let suite = Suite::from_file(file.path()).unwrap();
    assert_eq!(suite.pages.len(), 2);

    let missing = Suite::from_file(std::path::Path::new("/nonexistent/suite.toml")).unwrap_err();
    assert!(missing.is_configuration());
}

#[test]
fn fragment_inside_path_is_rejected() {
    let suite = Suite::from_toml(
        "[[pages]]\npath = \"training.html#ttp\"\n[[pages.checks]]\nkind = \"hero_visible\"\n",
    )
    .unwrap();
    let err = suite.validate().unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("training.html#ttp"));

    let query = Suite::from_toml(
        "[[pages]]\npath = \"home.html?lang=en\"\n[[pages.checks]]\nkind = \"hero_visible\"\n",
    )
    .unwrap();
    assert!(query.validate().unwrap_err().is_configuration());
}
