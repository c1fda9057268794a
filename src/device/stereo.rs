/// Why a stereo driver call did not take effect.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StereoStatus {
    /// No stereo driver is present.
    #[error("stereo unavailable")]
    Unavailable,
    /// The driver is present but stereo is switched off.
    #[error("stereo inactive")]
    Inactive,
    /// The driver rejected the call.
    #[error("stereo call failed")]
    Failed,
}

/// Whether new surfaces are created stereoised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SurfaceCreationMode {
    /// Driver heuristics decide.
    #[default]
    Auto,
    /// Force a stereo surface.
    ForceStereo,
    /// Force a mono surface.
    ForceMono,
}

impl SurfaceCreationMode {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Auto => 0,
            Self::ForceStereo => 1,
            Self::ForceMono => 2,
        }
    }
}

/// Stereo driver interface.
pub trait Stereo {
    /// Whether stereo rendering is currently active.
    fn is_active(&self) -> bool;
    /// Current separation, in percent.
    fn separation(&self) -> Result<f32, StereoStatus>;
    /// Set the separation, in percent.
    fn set_separation(&mut self, value: f32) -> Result<(), StereoStatus>;
    /// Current convergence.
    fn convergence(&self) -> Result<f32, StereoStatus>;
    /// Set the convergence.
    fn set_convergence(&mut self, value: f32) -> Result<(), StereoStatus>;
    /// Surface creation mode applied to resources created from now on.
    fn surface_creation_mode(&self) -> SurfaceCreationMode;
    /// Change the surface creation mode.
    fn set_surface_creation_mode(&mut self, mode: SurfaceCreationMode)
    -> Result<(), StereoStatus>;
    /// Toggle reverse stereo blits (copying a stereo resource side by side into a mono one).
    fn set_reverse_blit(&mut self, enable: bool) -> Result<(), StereoStatus>;
}

/// In-memory stereo driver.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftStereo {
    /// Whether stereo is active.
    pub active: bool,
    /// Separation in percent.
    pub separation: f32,
    /// Convergence.
    pub convergence: f32,
    /// Current surface creation mode.
    pub creation_mode: SurfaceCreationMode,
    /// Whether reverse blits are enabled.
    pub reverse_blit: bool,
    /// Number of times reverse blit was switched on.
    pub reverse_blits: u32,
}

impl Default for SoftStereo {
    fn default() -> Self {
        Self {
            active: true,
            separation: 50.0,
            convergence: 1.0,
            creation_mode: SurfaceCreationMode::Auto,
            reverse_blit: false,
            reverse_blits: 0,
        }
    }
}

impl Stereo for SoftStereo {
    fn is_active(&self) -> bool {
        self.active
    }

    fn separation(&self) -> Result<f32, StereoStatus> {
        if !self.active {
            return Err(StereoStatus::Inactive);
        }
        Ok(self.separation)
    }

    fn set_separation(&mut self, value: f32) -> Result<(), StereoStatus> {
        if !self.active {
            return Err(StereoStatus::Inactive);
        }
        self.separation = value.clamp(0.0, 100.0);
        Ok(())
    }

    fn convergence(&self) -> Result<f32, StereoStatus> {
        if !self.active {
            return Err(StereoStatus::Inactive);
        }
        Ok(self.convergence)
    }

    fn set_convergence(&mut self, value: f32) -> Result<(), StereoStatus> {
        if !self.active {
            return Err(StereoStatus::Inactive);
        }
        self.convergence = value;
        Ok(())
    }

    fn surface_creation_mode(&self) -> SurfaceCreationMode {
        self.creation_mode
    }

    fn set_surface_creation_mode(
        &mut self,
        mode: SurfaceCreationMode,
    ) -> Result<(), StereoStatus> {
        self.creation_mode = mode;
        Ok(())
    }

    fn set_reverse_blit(&mut self, enable: bool) -> Result<(), StereoStatus> {
        if enable && !self.reverse_blit {
            self.reverse_blits += 1;
        }
        self.reverse_blit = enable;
        Ok(())
    }
}
