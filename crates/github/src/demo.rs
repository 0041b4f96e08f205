use petyard_common::Contributor;

/// Fixed stand-in list used when the contributors fetch fails.
pub fn demo_contributors() -> Vec<Contributor> {
    vec![
        Contributor::new("octocat", 1, "https://github.com/octocat.png", 100),
        Contributor::new("github", 2, "https://github.com/github.png", 50),
        Contributor::new("torvalds", 3, "https://github.com/torvalds.png", 25),
    ]
}
