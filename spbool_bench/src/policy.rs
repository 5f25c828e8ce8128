use crate::backend::{DeviceInfo, DeviceKind, PlatformInfo};

/// Decides which platform a benchmark runs on. The first accepted platform in
/// enumeration order wins.
pub trait PlatformPolicy {
    fn accepts(&self, platform: &PlatformInfo) -> bool;
}

impl<F: Fn(&PlatformInfo) -> bool> PlatformPolicy for F {
    fn accepts(&self, platform: &PlatformInfo) -> bool {
        self(platform)
    }
}

pub trait DevicePolicy {
    fn accepts(&self, device: &DeviceInfo) -> bool;
}

impl<F: Fn(&DeviceInfo) -> bool> DevicePolicy for F {
    fn accepts(&self, device: &DeviceInfo) -> bool {
        self(device)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AnyPlatform;

impl PlatformPolicy for AnyPlatform {
    fn accepts(&self, _platform: &PlatformInfo) -> bool {
        true
    }
}

/// Accepts platforms whose name or vendor contains one of the keywords, ignoring
/// case. Without keywords every platform is accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameKeywords {
    keywords: Vec<String>,
}

impl NameKeywords {
    pub fn new<I: IntoIterator<Item = S>, S: AsRef<str>>(keywords: I) -> Self {
        NameKeywords {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Platforms exposing NVIDIA devices.
    pub fn cuda() -> Self {
        Self::new(["cuda", "nvidia"])
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl PlatformPolicy for NameKeywords {
    fn accepts(&self, platform: &PlatformInfo) -> bool {
        let (name, vendor) = (platform.name.to_lowercase(), platform.vendor.to_lowercase());
        self.keywords.is_empty()
            || self
                .keywords
                .iter()
                .any(|k| name.contains(k.as_str()) || vendor.contains(k.as_str()))
    }
}

/// Accepts devices of the given kind, or any device for `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceKindPolicy(pub Option<DeviceKind>);

impl DevicePolicy for DeviceKindPolicy {
    fn accepts(&self, device: &DeviceInfo) -> bool {
        self.0.map_or(true, |kind| device.kind == kind)
    }
}

pub fn select_platform<'a, P: PlatformPolicy + ?Sized>(
    policy: &P,
    platforms: &'a [PlatformInfo],
) -> Option<&'a PlatformInfo> {
    platforms.iter().find(|p| policy.accepts(p))
}

pub fn select_device<'a, P: DevicePolicy + ?Sized>(
    policy: &P,
    devices: &'a [DeviceInfo],
) -> Option<&'a DeviceInfo> {
    devices.iter().find(|d| policy.accepts(d))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platforms(names: &[(&str, &str)]) -> Vec<PlatformInfo> {
        names
            .iter()
            .enumerate()
            .map(|(index, (name, vendor))| PlatformInfo {
                index,
                name: name.to_string(),
                vendor: vendor.to_string(),
            })
            .collect()
    }

    fn device(index: usize, kind: DeviceKind) -> DeviceInfo {
        DeviceInfo {
            index,
            name: format!("device {}", index),
            kind,
            compute_units: 1,
        }
    }

    #[test]
    fn first_match_wins() {
        let ps = platforms(&[
            ("Intel(R) OpenCL", "Intel(R) Corporation"),
            ("NVIDIA CUDA", "NVIDIA Corporation"),
            ("Portable Computing Language", "The pocl project"),
            ("Another CUDA", "NVIDIA Corporation"),
        ]);
        assert_eq!(select_platform(&NameKeywords::cuda(), &ps).map(|p| p.index), Some(1));
        assert_eq!(
            select_platform(&NameKeywords::new(["POCL"]), &ps).map(|p| p.index),
            Some(2)
        );
        assert_eq!(select_platform(&AnyPlatform, &ps).map(|p| p.index), Some(0));
        assert_eq!(
            select_platform(&|p: &PlatformInfo| p.name.starts_with("Another"), &ps)
                .map(|p| p.index),
            Some(3)
        );
    }

    #[test]
    fn no_match() {
        let ps = platforms(&[("Intel(R) OpenCL", "Intel(R) Corporation")]);
        assert_eq!(select_platform(&NameKeywords::cuda(), &ps), None);
        assert_eq!(select_platform(&AnyPlatform, &[]), None);
    }

    #[test]
    fn empty_keywords_accept_everything() {
        let ps = platforms(&[("Host", "rayon")]);
        assert!(NameKeywords::new(Vec::<String>::new()).accepts(&ps[0]));
        assert!(NameKeywords::new([""]).keywords().is_empty());
    }

    #[test]
    fn device_kind() {
        let ds = [device(0, DeviceKind::Cpu), device(1, DeviceKind::Gpu), device(2, DeviceKind::Gpu)];
        assert_eq!(
            select_device(&DeviceKindPolicy(Some(DeviceKind::Gpu)), &ds).map(|d| d.index),
            Some(1)
        );
        assert_eq!(select_device(&DeviceKindPolicy(None), &ds).map(|d| d.index), Some(0));
        assert_eq!(
            select_device(&DeviceKindPolicy(Some(DeviceKind::Accelerator)), &ds),
            None
        );
    }
}
