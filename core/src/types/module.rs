use std::fmt;

/// Functional test regions of the phantom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum PhantomModule {
    /// CTP404 contrast/linearity region
    Contrast,
    /// CTP486 uniformity region
    Uniformity,
    /// CTP528 line-pair region
    Resolution,
}

impl PhantomModule {
    /// Catalogue name of the module
    pub fn catalogue_name(&self) -> &'static str {
        match self {
            PhantomModule::Contrast => "CTP404",
            PhantomModule::Uniformity => "CTP486",
            PhantomModule::Resolution => "CTP528",
        }
    }

    pub fn simple_name(&self) -> &'static str {
        match self {
            PhantomModule::Contrast => "contrast",
            PhantomModule::Uniformity => "uniformity",
            PhantomModule::Resolution => "resolution",
        }
    }
}

impl fmt::Display for PhantomModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Slice index of each module within an ImageStack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct ModuleSliceIndex {
    pub resolution: usize,
    pub contrast: usize,
    pub uniformity: usize,
}

impl ModuleSliceIndex {
    pub fn get(&self, module: PhantomModule) -> usize {
        match module {
            PhantomModule::Contrast => self.contrast,
            PhantomModule::Uniformity => self.uniformity,
            PhantomModule::Resolution => self.resolution,
        }
    }

    /// All three indices differ
    pub fn is_distinct(&self) -> bool {
        self.resolution != self.contrast
            && self.resolution != self.uniformity
            && self.contrast != self.uniformity
    }
}
