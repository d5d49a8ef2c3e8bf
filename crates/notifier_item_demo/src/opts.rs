use anyhow::{Context, Result};
use clap::Parser;
use notifier_item::{BusIdentityPolicy, Category, IconValue};

#[derive(Parser, Debug, PartialEq)]
#[command(version, about)]
pub struct Opt {
    /// Write out debug logs.
    #[arg(long = "debug")]
    pub log_debug: bool,

    /// Id of the item.
    #[arg(long, default_value = "notifier-item-demo")]
    pub id: String,

    /// One of ApplicationStatus, Communications, SystemServices or Hardware.
    #[arg(long, default_value_t = Category::ApplicationStatus)]
    pub category: Category,

    /// Freedesktop icon name to show.
    #[arg(long, default_value = "dialog-information", conflicts_with = "icon_file")]
    pub icon_name: String,

    /// Image file to show instead of a named icon.
    #[arg(long)]
    pub icon_file: Option<std::path::PathBuf>,

    #[arg(long)]
    pub title: Option<String>,

    /// Tooltip text, as `title` or `title:body`.
    #[arg(long)]
    pub tooltip: Option<String>,

    /// Whether to claim a well-known name on the bus: auto, never or always.
    #[arg(long, default_value_t = BusIdentityPolicy::Auto)]
    pub identity: BusIdentityPolicy,
}

impl Opt {
    pub fn from_env() -> Self {
        Opt::parse()
    }

    /// The icon to show, loaded from `--icon-file` if given.
    pub fn icon(&self) -> Result<IconValue> {
        match &self.icon_file {
            Some(path) => {
                let bitmap = image::open(path).with_context(|| format!("Failed to load icon {}", path.display()))?;
                Ok(bitmap.into_rgba8().into())
            }
            None => Ok(self.icon_name.as_str().into()),
        }
    }

    /// Tooltip title and body.
    pub fn tooltip(&self) -> Option<(&str, Option<&str>)> {
        let tooltip = self.tooltip.as_deref()?;
        Some(match tooltip.split_once(':') {
            Some((title, body)) => (title, Some(body)),
            None => (tooltip, None),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_defaults() {
        let opt = Opt::try_parse_from(["demo"]).unwrap();
        assert_eq!("notifier-item-demo", opt.id);
        assert_eq!(Category::ApplicationStatus, opt.category);
        assert_eq!(BusIdentityPolicy::Auto, opt.identity);
        assert_eq!(None, opt.tooltip());
        assert!(!opt.log_debug);
    }

    #[test]
    fn test_parse_options() {
        let opt = Opt::try_parse_from([
            "demo",
            "--debug",
            "--category",
            "Hardware",
            "--identity",
            "never",
            "--tooltip",
            "Battery:40% left",
        ])
        .unwrap();
        assert!(opt.log_debug);
        assert_eq!(Category::Hardware, opt.category);
        assert_eq!(BusIdentityPolicy::Never, opt.identity);
        assert_eq!(Some(("Battery", Some("40% left"))), opt.tooltip());
    }

    #[test]
    fn test_icon() {
        let opt = Opt::try_parse_from(["demo", "--icon-name", "battery-low"]).unwrap();
        assert!(matches!(opt.icon().unwrap(), IconValue::Name(name) if name == "battery-low"));

        let opt = Opt::try_parse_from(["demo", "--icon-file", "/nonexistent/icon.png"]).unwrap();
        assert!(opt.icon().is_err());

        let path = std::env::temp_dir().join(format!("notifier-item-demo-{}.png", std::process::id()));
        image::RgbaImage::new(3, 2).save(&path).unwrap();
        let opt = Opt::try_parse_from(["demo", "--icon-file", path.to_str().unwrap()]).unwrap();
        let icon = opt.icon();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(icon.unwrap(), IconValue::Bitmap(bitmap) if bitmap.dimensions() == (3, 2)));
    }

    #[test]
    fn test_icon_name_conflicts_with_file() {
        assert!(Opt::try_parse_from(["demo", "--icon-name", "a", "--icon-file", "a.png"]).is_err());
    }
}
