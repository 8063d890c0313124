use tvgrid::{
    ActionKind, ColumnDef, ColumnSpec, FieldDef, GridError, GridModel, GridState, MemorySource,
    Navigator, Schema, StdFormatter, TemplateRoutes, Value, ViewModel, ViewModelBuilder,
};

#[derive(Default)]
struct Recorder {
    visited: Vec<String>,
}

impl Navigator for Recorder {
    fn navigate(&mut self, url: &str) -> Result<(), GridError> {
        self.visited.push(url.to_string());
        Ok(())
    }
}

fn source() -> MemorySource {
    let schema = Schema::new(vec![
        FieldDef::new("id"),
        FieldDef::new("name"),
        FieldDef::new("price"),
    ])
    .with_primary_key("id");
    MemorySource::new(schema)
        .with_name("product")
        .with_row(vec![Value::Int(1), "Bob".into(), Value::Int(10)])
        .with_row(vec![Value::Int(2), "Al".into(), Value::Int(20)])
}

fn view_model() -> ViewModel {
    let formatter = StdFormatter::default();
    ViewModelBuilder::new(&formatter)
        .column("name")
        .column(ColumnDef::default().attribute("price").format("currency"))
        .build(&source())
        .unwrap()
}

fn names(model: &GridModel) -> Vec<String> {
    model
        .derived_rows()
        .map(|r| r.get("name").unwrap_or_default().to_string())
        .collect()
}

#[test]
fn builds_labels_rows_and_default_sort() {
    let vm = view_model();

    let labels: Vec<(&str, &str)> = vm
        .labels
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(labels, vec![("name", "Name"), ("price", "Price")]);

    assert_eq!(vm.rows.len(), 2);
    assert_eq!(vm.rows[0].get("name"), Some("Bob"));
    assert_eq!(vm.rows[0].get("price"), Some("$10.00"));
    assert_eq!(vm.rows[1].get("name"), Some("Al"));
    assert_eq!(vm.rows[1].get("price"), Some("$20.00"));
    assert_eq!(vm.sort_key.as_deref(), Some("name"));
    assert_eq!(vm.primary_key, "id");

    let model = GridModel::new(vm, Box::new(TemplateRoutes::new("product")));
    assert_eq!(names(&model), vec!["Al", "Bob"]);
}

#[test]
fn filter_matches_case_insensitively() {
    let mut model = GridModel::new(view_model(), Box::new(TemplateRoutes::new("product")));
    model.set_filter("name", "al");
    assert_eq!(names(&model), vec!["Al"]);

    model.set_filter("name", "AL");
    assert_eq!(names(&model), vec!["Al"]);

    model.clear_filters();
    assert_eq!(names(&model), vec!["Al", "Bob"]);
}

#[test]
fn sorting_twice_toggles_back() {
    let mut model = GridModel::new(view_model(), Box::new(TemplateRoutes::new("product")));

    model.sort("price");
    assert_eq!(names(&model), vec!["Bob", "Al"]);
    model.sort("price");
    assert_eq!(names(&model), vec!["Al", "Bob"]);
    assert!(model.sort_state().reverse);
    model.sort("price");
    assert_eq!(names(&model), vec!["Bob", "Al"]);
    assert!(!model.sort_state().reverse);
}

#[test]
fn first_label_wins() {
    let formatter = StdFormatter::default();
    let columns: Vec<ColumnSpec> = vec![
        "name".into(),
        ColumnDef::default().attribute("name").label("Full Name").into(),
    ];
    let vm = ViewModelBuilder::new(&formatter)
        .columns(columns)
        .build(&source())
        .unwrap();
    assert_eq!(vm.labels.len(), 1);
    assert_eq!(vm.labels.get("name").map(String::as_str), Some("Name"));
}

#[test]
fn row_action_follows_displayed_order() {
    let mut model = GridModel::new(view_model(), Box::new(TemplateRoutes::new("product")));
    let mut recorder = Recorder::default();

    // Al is displayed first
    let url = model
        .activate_row_action(0, ActionKind::View, &mut recorder)
        .unwrap();
    assert_eq!(url.as_deref(), Some("/product/view?id=2"));

    model.set_filter("name", "bob");
    model
        .activate_row_action(0, ActionKind::Update, &mut recorder)
        .unwrap();
    assert_eq!(recorder.visited, vec!["/product/view?id=2", "/product/update?id=1"]);

    let missing = model
        .activate_row_action(5, ActionKind::View, &mut recorder)
        .unwrap();
    assert!(missing.is_none());
    assert_eq!(recorder.visited.len(), 2);
}

#[test]
fn state_survives_json() {
    let mut model = GridModel::new(view_model(), Box::new(TemplateRoutes::new("product")));
    model.sort("price");
    model.sort("price");
    model.set_filter("name", "o");

    let json = serde_json::to_string(&model.state()).unwrap();
    let state: GridState = serde_json::from_str(&json).unwrap();
    let restored = GridModel::from_state(state, Box::new(TemplateRoutes::new("product")));

    assert_eq!(restored.sort_state(), model.sort_state());
    assert_eq!(restored.filters(), model.filters());
    assert_eq!(names(&restored), names(&model));
}
