use nametag_pdf::geometry::mm_to_pt;
use nametag_pdf::{
    estimate_page_count, render, ExportConfig, PaperSize, PersonRecord, RenderRequest, SizeMode,
    TemplateAsset, TextFieldSpec, TextStyle, WatermarkSpec,
};
use printpdf::lopdf;

fn persons(n: usize) -> Vec<PersonRecord> {
    (0..n)
        .map(|i| {
            PersonRecord::new(
                format!("p{}", i + 1),
                [("Name", format!("Person {}", i + 1)), ("Company", "Acme".to_string())],
            )
        })
        .collect()
}

fn request(count: usize, layout: &str) -> RenderRequest {
    RenderRequest {
        title: "Test Event".into(),
        templates: vec![TemplateAsset::builtin("default-template", 900, 550)],
        persons: persons(count),
        text_fields: vec![
            TextFieldSpec {
                column: "Name".into(),
                x: 50.0,
                y: 55.0,
                style: TextStyle {
                    font_size: 20.0,
                    font_weight: 700,
                    ..Default::default()
                },
            },
            TextFieldSpec {
                column: "Company".into(),
                x: 50.0,
                y: 70.0,
                style: TextStyle::default(),
            },
        ],
        export: ExportConfig {
            layout: layout.into(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Operator names per page, in page order
fn page_operators(bytes: &[u8]) -> Vec<Vec<lopdf::content::Operation>> {
    let doc = lopdf::Document::load_mem(bytes).expect("Output is not a readable PDF");
    doc.get_pages()
        .values()
        .map(|id| {
            doc.get_and_decode_page_content(*id)
                .expect("Page content unreadable")
                .operations
        })
        .collect()
}

fn count_ops(page: &[lopdf::content::Operation], operator: &str) -> usize {
    page.iter().filter(|op| op.operator == operator).count()
}

#[test]
fn test_five_persons_on_two_pages() {
    let document = render(&request(5, "2x2")).unwrap();

    assert_eq!(document.page_count, 2);
    assert_eq!(document.placements.len(), 5);
    assert!(document.placements.iter().all(|p| p.drawn));

    let pages = page_operators(&document.bytes);
    assert_eq!(pages.len(), 2);
    assert_eq!(count_ops(&pages[0], "Do"), 4);
    assert_eq!(count_ops(&pages[1], "Do"), 1);
}

#[test]
fn test_estimate_matches_render() {
    let mut req = request(3, "2x2");
    req.export.blank_pages = 2;
    let estimate = estimate_page_count(req.persons.len(), &req.export);

    let document = render(&req).unwrap();
    assert_eq!(estimate, 2);
    assert_eq!(document.page_count, estimate);
    assert_eq!(page_operators(&document.bytes).len(), estimate);

    // Blank slots come last and carry no person
    let blanks: Vec<usize> = document
        .placements
        .iter()
        .filter(|p| p.person_id.is_none())
        .map(|p| p.slot)
        .collect();
    assert_eq!(blanks, vec![3, 4]);
}

#[test]
fn test_unparsable_layout_renders_as_two_by_two() {
    let reference = render(&request(5, "2x2")).unwrap();
    for layout in ["abc", "2", "2xY"] {
        let document = render(&request(5, layout)).unwrap();
        assert_eq!(document.page_count, reference.page_count, "layout {:?}", layout);
        assert_eq!(document.placements, reference.placements, "layout {:?}", layout);
    }
}

#[test]
fn test_no_watermark_no_text_operators() {
    let document = render(&request(2, "2x2")).unwrap();
    for page in page_operators(&document.bytes) {
        assert_eq!(count_ops(&page, "Tj"), 0);
    }
}

#[test]
fn test_watermark_tiles_on_every_page() {
    for paper in [PaperSize::A4, PaperSize::Letter] {
        let mut req = request(5, "2x2");
        req.export.paper_size = paper;
        req.watermark = WatermarkSpec::new("SAMPLE");

        let document = render(&req).unwrap();
        let pages = page_operators(&document.bytes);
        assert_eq!(pages.len(), 2);
        for page in &pages {
            assert_eq!(count_ops(page, "Tj"), 15, "{:?}", paper);
        }
    }
}

#[test]
fn test_uncoverable_watermark_is_skipped() {
    let mut req = request(1, "2x2");
    req.watermark = WatermarkSpec::new("견본");

    let document = render(&req).unwrap();
    let pages = page_operators(&document.bytes);
    assert_eq!(pages.len(), 1);
    assert_eq!(count_ops(&pages[0], "Tj"), 0);
    assert_eq!(count_ops(&pages[0], "Do"), 1);
}

#[test]
fn test_partly_coverable_watermark_is_skipped() {
    let mut req = request(5, "2x2");
    req.watermark = WatermarkSpec::new("SAMPLE 견본");

    let document = render(&req).unwrap();
    let pages = page_operators(&document.bytes);
    assert_eq!(pages.len(), 2);
    for page in &pages {
        assert_eq!(count_ops(page, "Tj"), 0);
    }
    assert_eq!(count_ops(&pages[0], "Do"), 4);
    assert_eq!(count_ops(&pages[1], "Do"), 1);
}

#[test]
fn test_fixed_mode_draws_fixed_size() {
    let mut req = request(3, "2x3");
    req.export.size_mode = SizeMode::Fixed;
    req.export.fixed_width_mm = 90.0;
    req.export.fixed_height_mm = 55.0;

    let document = render(&req).unwrap();
    for placement in &document.placements {
        let rect = placement.rect.expect("fixed tags always have a rect");
        assert!((rect.width - mm_to_pt(90.0)).abs() < 0.01);
        assert!((rect.height - mm_to_pt(55.0)).abs() < 0.01);
    }
}

#[test]
fn test_missing_template_keeps_later_slots() {
    let mut req = request(3, "2x2");
    req.templates = vec![];

    let document = render(&req).unwrap();
    assert_eq!(document.page_count, 1);
    let slots: Vec<(usize, bool)> = document.placements.iter().map(|p| (p.slot, p.drawn)).collect();
    assert_eq!(slots, vec![(0, false), (1, false), (2, false)]);
    assert_eq!(count_ops(&page_operators(&document.bytes)[0], "Do"), 0);
}

#[test]
fn test_render_is_repeatable() {
    let mut req = request(3, "2x2");
    req.watermark = WatermarkSpec::new("DRAFT");

    let first = render(&req).unwrap();
    let second = render(&req).unwrap();
    assert_eq!(first.page_count, second.page_count);
    assert_eq!(first.placements, second.placements);

    let text = |bytes: &[u8]| -> Vec<String> {
        page_operators(bytes)
            .iter()
            .flatten()
            .filter(|op| op.operator == "Tj")
            .map(|op| format!("{:?}", op.operands))
            .collect()
    };
    assert_eq!(text(&first.bytes), text(&second.bytes));
}

#[test]
fn test_custom_template_image() {
    let mut png = Vec::new();
    ::image::RgbImage::from_pixel(60, 40, ::image::Rgb([200, 30, 30]))
        .write_to(&mut std::io::Cursor::new(&mut png), ::image::ImageFormat::Png)
        .unwrap();

    let mut req = request(2, "1x2");
    req.templates = vec![
        TemplateAsset::custom("red", 60, 40, png),
        TemplateAsset::custom("broken", 60, 40, b"not an image".to_vec()),
    ];
    req.persons[1].template_id = Some("broken".into());

    let document = render(&req).unwrap();
    // A broken image still yields a (white) nametag
    assert!(document.placements.iter().all(|p| p.drawn));
    assert_eq!(count_ops(&page_operators(&document.bytes)[0], "Do"), 2);
}

#[test]
fn test_no_persons_renders_empty_document() {
    let document = render(&request(0, "2x2")).unwrap();
    assert_eq!(document.page_count, 0);
    assert!(document.placements.is_empty());
    assert!(document.bytes.starts_with(b"%PDF"));
}
