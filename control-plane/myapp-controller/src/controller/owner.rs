use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    ObjectMeta, OwnerReference,
};
use kube::{Resource, ResourceExt};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("owner {kind} {name} has no uid; it must be persisted first")]
    NotPersisted { kind: String, name: String },
    #[error(
        "cross-namespace owner reference: owner in {owner_ns}, child in {child_ns}"
    )]
    CrossNamespace { owner_ns: String, child_ns: String },
    #[error("object is already controlled by {kind} {name}")]
    AlreadyOwned { kind: String, name: String },
}

pub(crate) fn group_of(api_version: &str) -> &str {
    match api_version.split_once('/') {
        Some((group, _)) => group,
        None => "",
    }
}

fn refers_to_same_object(a: &OwnerReference, b: &OwnerReference) -> bool {
    group_of(&a.api_version) == group_of(&b.api_version)
        && a.kind == b.kind
        && a.name == b.name
}

/// Record `owner` as the controlling owner on `child`.
///
/// An existing reference to the same group/kind/name is replaced in place so
/// a recreated owner (new uid) adopts its leftovers. Any other controlling
/// reference is a hard error. Non-controller references are kept.
pub fn bind_owner<P>(
    owner: &P,
    mut child: ObjectMeta,
) -> Result<ObjectMeta, OwnershipError>
where
    P: Resource<DynamicType = ()>,
{
    let owner_kind = P::kind(&()).to_string();
    let mut oref = owner.controller_owner_ref(&()).ok_or_else(|| {
        OwnershipError::NotPersisted {
            kind: owner_kind.clone(),
            name: owner.name_any(),
        }
    })?;
    oref.block_owner_deletion = Some(true);

    if let Some(owner_ns) = owner.namespace() {
        let child_ns = child.namespace.clone().unwrap_or_default();
        if child_ns != owner_ns {
            return Err(OwnershipError::CrossNamespace { owner_ns, child_ns });
        }
    }

    let refs = child.owner_references.get_or_insert_with(Vec::new);
    if let Some(other) = refs.iter().find(|r| {
        r.controller == Some(true) && !refers_to_same_object(r, &oref)
    }) {
        return Err(OwnershipError::AlreadyOwned {
            kind: other.kind.clone(),
            name: other.name.clone(),
        });
    }

    match refs.iter_mut().find(|r| refers_to_same_object(r, &oref)) {
        Some(existing) => *existing = oref,
        None => refs.push(oref),
    }
    Ok(child)
}
