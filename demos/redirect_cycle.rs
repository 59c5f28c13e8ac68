use dependent_fields::{
    parse_form_body, AdminContext, DataBridge, Events, Field, Form, MemoryForm,
    MemoryRelationStore, MemorySession, ParentValues, Record, Rehydrator, Request, Resolver,
    ResolverConfig, SubmissionInterceptor, Value,
};

/// The address form: Country always shown, Region only once a country is picked.
fn address_form(
    bridge: &DataBridge<'_>,
    context: &Option<AdminContext>,
    config: &ResolverConfig,
) -> Vec<Field> {
    Resolver::builder(bridge, context)
        .with_config(config)
        .configure_fields(|| {
            [
                Field::new("Street"),
                Field::new("Country"),
                Field::relation("Carrier", "Carrier"),
            ]
        })
        .depends_on("Country", |values: &ParentValues| {
            Field::new("Region").with_option("country", values["Country"].clone())
        })
        .build()
        .expect("address rules are valid")
        .fields()
        .expect("producers do not fail")
}

fn print_fields(fields: &[Field]) {
    for field in fields {
        match field.data() {
            Some(data) => println!("    {} (hidden) = {data}", field.name()),
            None => println!("    {}", field.name()),
        }
    }
}

fn main() {
    let config = ResolverConfig::default();
    let session = MemorySession::new();
    let carriers = MemoryRelationStore::new()
        .with("Carrier", Record::new(1_i64).with("label", "La Poste"))
        .with("Carrier", Record::new(2_i64).with("label", "Correos"));
    let saved = Record::new(42_i64)
        .with("Street", "1 Rue de Rivoli")
        .with("Country", "France");
    let events = Events::new().on_dependency_changed(|e| {
        println!("  dependency changed: {:?}", e.changed);
    });

    // 1. The edit page is rendered from the saved record.
    println!("GET /address/42");
    let get = Some(AdminContext::new("Address", Request::get()).with_instance(saved.clone()));
    let bridge = DataBridge::new(&session, &config);
    let fields = address_form(&bridge, &get, &config);
    print_fields(&fields);
    let state = fields
        .last()
        .and_then(Field::data)
        .unwrap_or_default()
        .to_owned();

    // 2. The user switches country. The submission is bridged, not saved.
    println!("POST /address/42");
    let body = format!(
        "Address[Street]=Calle+Mayor+1&Address[Country]=Spain&Address[Carrier]=2&Address[{}]={}",
        config.state_field,
        state.replace('"', "%22").replace('{', "%7B").replace('}', "%7D"),
    );
    let post = Some(
        AdminContext::new(
            "Address",
            Request::post(parse_form_body(&body).expect("well-formed body")),
        )
        .with_instance(saved.clone()),
    );
    let bridge = DataBridge::new(&session, &config);
    match SubmissionInterceptor::new(&bridge, &post, &config)
        .with_events(&events)
        .intercept("/address/42")
    {
        Ok(Some(redirect)) => println!("  {redirect}"),
        Ok(None) => println!("  saved"),
        Err(err) => println!("  error: {err}"),
    }

    // 3. The redirect lands back on the edit page with the submitted values.
    println!("GET /address/42");
    let get = Some(AdminContext::new("Address", Request::get()).with_instance(saved));
    let bridge = DataBridge::new(&session, &config);
    let fields = address_form(&bridge, &get, &config);
    print_fields(&fields);

    let mut form = MemoryForm::from_fields(fields);
    let written = Rehydrator::new(&bridge, &get, &carriers)
        .rehydrate(&mut form)
        .expect("carrier lookup succeeds");
    for name in written {
        let value = form.value(&name).cloned().unwrap_or(Value::Null);
        println!("    {name} <- {value}");
    }
}
